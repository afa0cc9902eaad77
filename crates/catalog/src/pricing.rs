//! Pricing a customer's selection of variant and options.

use serde::{Deserialize, Serialize};

use trattoria_core::{DomainError, DomainResult, Money};

use crate::food::FoodDetails;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedOption {
    pub group: String,
    pub choice: String,
}

/// What the customer picked for one cart line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    #[serde(default)]
    pub variant: Option<String>,
    #[serde(default)]
    pub options: Vec<SelectedOption>,
}

/// A validated selection with canonical names and unit prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedSelection {
    pub variant: Option<String>,
    pub options: Vec<SelectedOption>,
    /// Before the food's discount.
    pub list_unit_price: Money,
    pub unit_price: Money,
}

/// Validate `selection` against the food's variants and option groups and
/// compute the unit price.
///
/// Names match case-insensitively; the result carries the menu's spelling.
pub fn price_selection(food: &FoodDetails, selection: &Selection) -> DomainResult<PricedSelection> {
    let wanted_variant = selection
        .variant
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let (variant, mut list) = match (food.variants.is_empty(), wanted_variant) {
        (true, None) => (None, food.base_price),
        (true, Some(v)) => {
            return Err(DomainError::validation(format!(
                "'{}' has no variants (got '{v}')",
                food.name
            )));
        }
        (false, None) => {
            return Err(DomainError::validation(format!(
                "'{}' requires a variant",
                food.name
            )));
        }
        (false, Some(v)) => {
            let found = food
                .variants
                .iter()
                .find(|candidate| same_name(&candidate.name, v))
                .ok_or_else(|| {
                    DomainError::validation(format!("unknown variant '{v}' for '{}'", food.name))
                })?;
            (Some(found.name.clone()), found.price)
        }
    };

    let mut picked: Vec<SelectedOption> = Vec::with_capacity(selection.options.len());
    for opt in &selection.options {
        let group = food
            .option_groups
            .iter()
            .find(|g| same_name(&g.name, &opt.group))
            .ok_or_else(|| DomainError::validation(format!("unknown option group '{}'", opt.group)))?;
        let choice = group
            .choices
            .iter()
            .find(|c| same_name(&c.name, &opt.choice))
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "unknown choice '{}' in option group '{}'",
                    opt.choice, group.name
                ))
            })?;

        if picked
            .iter()
            .any(|p| p.group == group.name && p.choice == choice.name)
        {
            return Err(DomainError::validation(format!(
                "'{}' selected twice in '{}'",
                choice.name, group.name
            )));
        }

        list = list.checked_add(choice.price_delta)?;
        picked.push(SelectedOption {
            group: group.name.clone(),
            choice: choice.name.clone(),
        });
    }

    for group in &food.option_groups {
        let count = picked.iter().filter(|p| p.group == group.name).count();
        if group.required && count == 0 {
            return Err(DomainError::validation(format!(
                "a choice is required for '{}'",
                group.name
            )));
        }
        if count > usize::from(group.max_select) {
            return Err(DomainError::validation(format!(
                "at most {} choice(s) allowed for '{}'",
                group.max_select, group.name
            )));
        }
    }

    Ok(PricedSelection {
        variant,
        options: picked,
        list_unit_price: list,
        unit_price: list.percent_off(food.discount_percent),
    })
}

fn same_name(menu: &str, wanted: &str) -> bool {
    menu.to_lowercase() == wanted.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::food::tests::pizza_details;

    fn opt(group: &str, choice: &str) -> SelectedOption {
        SelectedOption { group: group.into(), choice: choice.into() }
    }

    #[test]
    fn variant_and_options_add_up() {
        let food = pizza_details();
        let priced = price_selection(
            &food,
            &Selection {
                variant: Some("large".into()),
                options: vec![opt("crust", "gluten FREE"), opt("Extras", "olives")],
            },
        )
        .unwrap();

        assert_eq!(priced.variant.as_deref(), Some("Large"));
        assert_eq!(priced.options, vec![opt("Crust", "Gluten free"), opt("Extras", "Olives")]);
        assert_eq!(priced.list_unit_price, Money::from_cents(1400 + 200 + 100));
        assert_eq!(priced.unit_price, priced.list_unit_price);
    }

    #[test]
    fn discount_applies_to_the_whole_unit() {
        let mut food = pizza_details();
        food.discount_percent = 20;
        let priced = price_selection(
            &food,
            &Selection { variant: Some("Small".into()), options: vec![opt("Crust", "Classic")] },
        )
        .unwrap();
        assert_eq!(priced.list_unit_price, Money::from_cents(900));
        assert_eq!(priced.unit_price, Money::from_cents(720));
    }

    #[test]
    fn variant_is_required_when_food_has_variants() {
        let food = pizza_details();
        let err = price_selection(&food, &Selection { variant: None, options: vec![opt("Crust", "Classic")] })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn variant_on_plain_food_is_rejected() {
        let mut food = pizza_details();
        food.variants.clear();
        food.option_groups.clear();
        assert!(price_selection(&food, &Selection { variant: Some("Large".into()), options: vec![] }).is_err());
        let priced = price_selection(&food, &Selection::default()).unwrap();
        assert_eq!(priced.unit_price, food.base_price);
    }

    #[test]
    fn required_group_needs_a_choice() {
        let food = pizza_details();
        let err = price_selection(&food, &Selection { variant: Some("Small".into()), options: vec![] })
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("Crust")));
    }

    #[test]
    fn max_select_is_enforced() {
        let food = pizza_details();
        let err = price_selection(
            &food,
            &Selection {
                variant: Some("Small".into()),
                options: vec![
                    opt("Crust", "Classic"),
                    opt("Extras", "Olives"),
                    opt("Extras", "Anchovies"),
                    opt("Extras", "Basil"),
                ],
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("at most 2")));
    }

    #[test]
    fn duplicates_and_unknowns_are_rejected() {
        let food = pizza_details();
        let dup = Selection {
            variant: Some("Small".into()),
            options: vec![opt("Crust", "Classic"), opt("crust", "classic")],
        };
        assert!(price_selection(&food, &dup).is_err());

        let unknown = Selection {
            variant: Some("Small".into()),
            options: vec![opt("Crust", "Stuffed")],
        };
        assert!(price_selection(&food, &unknown).is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// The discounted unit never exceeds the list unit, and the list
            /// unit is exactly variant + deltas.
            #[test]
            fn discounted_never_exceeds_list(
                discount in 0u8..=100,
                variant_idx in 0usize..2,
                extras in proptest::sample::subsequence(vec![0usize, 1, 2], 0..=2),
            ) {
                let mut food = pizza_details();
                food.discount_percent = discount;
                let variant = food.variants[variant_idx].clone();
                let mut options = vec![opt("Crust", "Classic")];
                let mut expected = variant.price.cents();
                for i in &extras {
                    let choice = &food.option_groups[1].choices[*i];
                    expected += choice.price_delta.cents();
                    options.push(opt("Extras", &choice.name));
                }

                let priced = price_selection(
                    &food,
                    &Selection { variant: Some(variant.name.clone()), options },
                ).unwrap();

                prop_assert_eq!(priced.list_unit_price.cents(), expected);
                prop_assert!(priced.unit_price <= priced.list_unit_price);
                if discount == 0 {
                    prop_assert_eq!(priced.unit_price, priced.list_unit_price);
                }
            }
        }
    }
}
