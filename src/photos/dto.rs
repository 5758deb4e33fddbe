use serde::{Deserialize, Serialize};

use crate::meals::units::Unit;
use crate::nutrients::Nutrients;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    /// Base64 image, optionally as a `data:image/...;base64,` URL.
    pub image: String,
}

/// A food recognised on a photo. `totals` are already scaled to
/// `quantity` of `unit`; saving it goes through the scaled food source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoFood {
    pub name: String,
    pub quantity: f64,
    pub unit: Unit,
    #[serde(flatten)]
    pub totals: Nutrients,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub foods: Vec<PhotoFood>,
}
