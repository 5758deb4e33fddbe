use std::collections::HashMap;

use time::Date;
use tracing::info;

use crate::calendar::Calendar;
use crate::daily::services::{apply_meal_increment, recompute_day};
use crate::error::{AppError, AppResult};
use crate::foods::repo_types::{FoodId, FoodItem, NewFood};
use crate::meals::dto::{FoodSource, LineItemInput, LineItemRemoved, MealWithItems, SaveMealRequest};
use crate::meals::repo_types::{
    sum_line_totals, LineFood, LineItemId, Meal, MealId, MealLineItem, NewLineItem, NewMeal,
};
use crate::meals::units::{compute_line_totals, Unit};
use crate::nutrients::Nutrients;
use crate::state::AppState;
use crate::users::repo_types::UserId;

struct PreparedLine {
    food: LineFood,
    quantity: f64,
    unit: Unit,
}

fn validate_quantity(quantity: f64) -> AppResult<()> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(AppError::validation("quantity must be greater than zero"));
    }
    Ok(())
}

fn validate_nutrients(n: &Nutrients) -> AppResult<()> {
    let values = [n.calories, n.protein, n.carbs, n.fat];
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(AppError::validation("nutrient values must be non-negative numbers"));
    }
    Ok(())
}

fn non_empty_name(name: Option<&str>) -> AppResult<String> {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => Ok(n.to_string()),
        _ => Err(AppError::validation("inline food requires a name")),
    }
}

/// Turns a request line into the food it will be stored against. Inline
/// foods are only described here; they are created with the meal.
fn prepare_food(food: FoodSource, quantity: f64, unit: Unit) -> AppResult<LineFood> {
    match food {
        FoodSource::Reference { id, .. } if id > 0 => Ok(LineFood::Catalog(id)),
        FoodSource::Reference {
            name,
            calories,
            protein,
            carbs,
            fat,
            ..
        } => {
            let name = non_empty_name(name.as_deref())?;
            let calories =
                calories.ok_or_else(|| AppError::validation("inline food requires calories"))?;
            let per_reference = Nutrients {
                calories,
                protein: protein.unwrap_or(0.0),
                carbs: carbs.unwrap_or(0.0),
                fat: fat.unwrap_or(0.0),
            };
            validate_nutrients(&per_reference)?;
            Ok(LineFood::Inline(NewFood {
                name,
                per_reference,
            }))
        }
        FoodSource::Scaled {
            name,
            calories,
            protein,
            carbs,
            fat,
        } => {
            let name = non_empty_name(Some(name.as_str()))?;
            let scaled = Nutrients::new(calories, protein, carbs, fat);
            validate_nutrients(&scaled)?;
            // stored per reference amount so later quantity edits scale from it
            let per_reference = scaled
                .scale(1.0 / unit.multiplier(quantity))
                .rounded_for_catalog();
            Ok(LineFood::Inline(NewFood {
                name,
                per_reference,
            }))
        }
    }
}

/// Checks every line before anything is written.
fn prepare(items: Vec<LineItemInput>) -> AppResult<Vec<PreparedLine>> {
    if items.is_empty() {
        return Err(AppError::validation("a meal needs at least one item"));
    }
    items
        .into_iter()
        .map(|item| {
            validate_quantity(item.quantity)?;
            let unit: Unit = item.unit.parse()?;
            Ok(PreparedLine {
                food: prepare_food(item.food, item.quantity, unit)?,
                quantity: item.quantity,
                unit,
            })
        })
        .collect()
}

/// Persists a meal with its lines and folds it into the day. Inline foods are
/// created in the same store call as the meal, so a rejected save leaves
/// nothing behind.
pub async fn save_meal(
    state: &AppState,
    user_id: UserId,
    req: SaveMealRequest,
) -> AppResult<MealWithItems> {
    let target = req
        .date
        .as_deref()
        .map(Calendar::parse_date_key)
        .transpose()?;
    let lines = prepare(req.items)?;

    let ids: Vec<FoodId> = lines
        .iter()
        .filter_map(|l| match l.food {
            LineFood::Catalog(id) => Some(id),
            LineFood::Inline(_) => None,
        })
        .collect();
    let catalog: HashMap<FoodId, FoodItem> = if ids.is_empty() {
        HashMap::new()
    } else {
        state
            .store
            .find_foods(&ids)
            .await?
            .into_iter()
            .map(|f| (f.id, f))
            .collect()
    };

    let mut items = Vec::with_capacity(lines.len());
    let mut inline_foods = 0;
    for line in lines {
        let per_reference = match &line.food {
            LineFood::Catalog(id) => {
                catalog
                    .get(id)
                    .ok_or(AppError::NotFound("food"))?
                    .per_reference
            }
            LineFood::Inline(food) => {
                inline_foods += 1;
                food.per_reference
            }
        };
        items.push(NewLineItem {
            totals: compute_line_totals(per_reference, line.quantity, line.unit),
            food: line.food,
            quantity: line.quantity,
            unit: line.unit,
        });
    }
    let totals: Nutrients = items.iter().map(|i| i.totals).sum();

    let eaten_at = state.calendar.timestamp_for(target);
    let day = state.calendar.date_of(eaten_at);
    let (meal, items) = state
        .store
        .insert_meal(NewMeal {
            user_id,
            slot: req.slot,
            eaten_at,
            totals,
            items,
        })
        .await?;
    info!(
        user_id,
        meal_id = meal.id,
        slot = meal.slot.as_str(),
        %day,
        calories = totals.calories,
        inline_foods,
        "meal saved"
    );

    if state.config.scoring.incremental_meal_saves {
        apply_meal_increment(state, user_id, day, totals).await?;
    } else {
        recompute_day(state, user_id, day).await?;
    }

    Ok(MealWithItems { meal, items })
}

async fn owned_meal(state: &AppState, user_id: UserId, meal_id: MealId) -> AppResult<Meal> {
    match state.store.find_meal(meal_id).await? {
        Some(meal) if meal.user_id == user_id => Ok(meal),
        _ => Err(AppError::NotFound("meal")),
    }
}

async fn owned_line_item(
    state: &AppState,
    user_id: UserId,
    item_id: LineItemId,
) -> AppResult<(Meal, MealLineItem)> {
    let item = state
        .store
        .find_line_item(item_id)
        .await?
        .ok_or(AppError::NotFound("line item"))?;
    let meal = owned_meal(state, user_id, item.meal_id)
        .await
        .map_err(|_| AppError::NotFound("line item"))?;
    Ok((meal, item))
}

/// Deletes the meal and re-sums its day from the remaining meals.
pub async fn delete_meal(state: &AppState, user_id: UserId, meal_id: MealId) -> AppResult<()> {
    let meal = owned_meal(state, user_id, meal_id).await?;
    if !state.store.delete_meal(meal.id).await? {
        return Err(AppError::NotFound("meal"));
    }
    let day = state.calendar.date_of(meal.eaten_at);
    info!(user_id, meal_id, %day, "meal deleted");
    recompute_day(state, user_id, day).await?;
    Ok(())
}

/// Re-sums the meal's cached totals from its remaining lines.
async fn refresh_meal_totals(state: &AppState, meal: Meal) -> AppResult<MealWithItems> {
    let items = state.store.list_line_items(meal.id).await?;
    let totals = sum_line_totals(&items);
    state.store.set_meal_totals(meal.id, totals).await?;
    Ok(MealWithItems {
        meal: Meal { totals, ..meal },
        items,
    })
}

/// Removes one line; removing the last line removes the meal.
pub async fn delete_line_item(
    state: &AppState,
    user_id: UserId,
    item_id: LineItemId,
) -> AppResult<LineItemRemoved> {
    let (meal, _) = owned_line_item(state, user_id, item_id).await?;
    state.store.delete_line_item(item_id).await?;
    let day = state.calendar.date_of(meal.eaten_at);

    let remaining = state.store.list_line_items(meal.id).await?;
    let removed = if remaining.is_empty() {
        state.store.delete_meal(meal.id).await?;
        info!(user_id, meal_id = meal.id, "last item removed, meal deleted");
        LineItemRemoved {
            meal_deleted: true,
            meal: None,
        }
    } else {
        LineItemRemoved {
            meal_deleted: false,
            meal: Some(refresh_meal_totals(state, meal).await?),
        }
    };

    recompute_day(state, user_id, day).await?;
    Ok(removed)
}

/// Recomputes the line from its food's reference values, never from the old
/// line totals, so repeated edits do not compound.
pub async fn update_line_item_quantity(
    state: &AppState,
    user_id: UserId,
    item_id: LineItemId,
    quantity: f64,
) -> AppResult<MealWithItems> {
    validate_quantity(quantity)?;
    let (meal, item) = owned_line_item(state, user_id, item_id).await?;
    let food = state
        .store
        .find_foods(&[item.food_id])
        .await?
        .into_iter()
        .next()
        .ok_or(AppError::NotFound("food"))?;

    let totals = compute_line_totals(food.per_reference, quantity, item.unit);
    state.store.update_line_item(item_id, quantity, totals).await?;
    info!(user_id, item_id, quantity, calories = totals.calories, "line quantity updated");

    let day = state.calendar.date_of(meal.eaten_at);
    let updated = refresh_meal_totals(state, meal).await?;
    recompute_day(state, user_id, day).await?;
    Ok(updated)
}

/// Meals of one civil day with their lines, oldest first.
pub async fn list_meals_for_day(
    state: &AppState,
    user_id: UserId,
    day: Date,
) -> AppResult<Vec<MealWithItems>> {
    let (start, end) = state.calendar.day_bounds(day);
    let meals = state.store.meals_between(user_id, start, end).await?;
    let mut out = Vec::with_capacity(meals.len());
    for meal in meals {
        let items = state.store.list_line_items(meal.id).await?;
        out.push(MealWithItems { meal, items });
    }
    Ok(out)
}
