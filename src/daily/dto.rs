use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct InvalidDayRequest {
    pub invalid: bool,
}
