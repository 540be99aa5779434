//! Long-lived bill state and the allocation contract
//!
//! Holds the ground-truth bill the allocation/UI layer reads, along with the
//! explicit mutation operations it calls. Every operation preserves the
//! quantity invariant: an item's original quantity always equals its
//! remaining quantity plus the sum of its color allocations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{round2, service_charge_pattern, BillCharge, BillItem, ParseResult, DEFAULT_COLORS};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillState {
    pub bill_image: Option<String>,
    pub bill_text: String,
    pub items: Vec<BillItem>,
    pub charges: Vec<BillCharge>,
    pub net_total: Option<f64>,
    /// Tip amounts assigned per color
    pub tip_allocations: BTreeMap<String, f64>,
    pub user_colors: Vec<String>,
    pub active_color: Option<String>,
    pub num_persons: u32,
    pub split_charges_evenly: bool,
    pub selected_charge_color: Option<String>,
    pub tip_input: f64,
    pub split_tip_evenly: bool,
    pub selected_tip_color: Option<String>,
    pub split_evenly: bool,
    #[serde(skip)]
    has_user_edits: bool,
}

impl Default for BillState {
    fn default() -> Self {
        let user_colors: Vec<String> = DEFAULT_COLORS.iter().map(|c| c.to_string()).collect();
        let active_color = user_colors.first().cloned();
        Self {
            bill_image: None,
            bill_text: String::new(),
            items: Vec::new(),
            charges: Vec::new(),
            net_total: None,
            tip_allocations: BTreeMap::new(),
            user_colors,
            active_color,
            num_persons: 5,
            split_charges_evenly: true,
            selected_charge_color: None,
            tip_input: 0.0,
            split_tip_evenly: true,
            selected_tip_color: None,
            split_evenly: false,
            has_user_edits: false,
        }
    }
}

impl BillState {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the user has manually edited the bill in any way; a later
    /// engine run must not overwrite that work
    pub fn has_user_edits(&self) -> bool {
        self.has_user_edits
    }

    /// Replace the parsed bill data with a fresh engine result
    pub fn publish(&mut self, result: ParseResult) {
        self.items = result.items;
        self.charges = result.charges;
        self.net_total = result.net_total;
    }

    /// Clear parse-derived state ahead of a new capture
    pub fn clear_parse_state(&mut self) {
        self.items.clear();
        self.charges.clear();
        self.net_total = None;
        self.tip_allocations.clear();
    }

    /// Full reset back to a blank bill
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut BillItem> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or_else(|| Error::InvalidData(format!("item index {index} out of range ({len} items)")))
    }

    /// Move one unallocated unit of the item to the active color
    pub fn allocate_one(&mut self, index: usize) -> Result<()> {
        let Some(color) = self.active_color.clone() else {
            return Ok(());
        };
        self.has_user_edits = true;
        let item = self.item_mut(index)?;
        if item.quantity == 0 {
            return Ok(());
        }
        item.quantity -= 1;
        *item.color_allocations.entry(color).or_insert(0) += 1;
        Ok(())
    }

    /// Return one allocated unit from the color back to the item
    pub fn deallocate_one(&mut self, index: usize, color: &str) -> Result<()> {
        self.has_user_edits = true;
        let item = self.item_mut(index)?;
        let Some(current) = item.color_allocations.get_mut(color) else {
            return Ok(());
        };
        // Rehydrated state may carry a zero entry for the color
        if *current == 0 {
            return Ok(());
        }
        *current -= 1;
        if *current == 0 {
            item.color_allocations.remove(color);
        }
        item.quantity += 1;
        Ok(())
    }

    /// Move one allocated unit from `from_color` to the active color
    pub fn override_allocation(&mut self, index: usize, from_color: &str) -> Result<()> {
        let Some(to_color) = self.active_color.clone() else {
            return Ok(());
        };
        if to_color == from_color {
            return Ok(());
        }
        self.has_user_edits = true;
        let item = self.item_mut(index)?;
        let Some(current) = item.color_allocations.get_mut(from_color) else {
            return Ok(());
        };
        // Rehydrated state may carry a zero entry for the color
        if *current == 0 {
            return Ok(());
        }
        *current -= 1;
        if *current == 0 {
            item.color_allocations.remove(from_color);
        }
        *item.color_allocations.entry(to_color).or_insert(0) += 1;
        Ok(())
    }

    /// Undo every allocation, restoring original quantities
    pub fn undo_allocations(&mut self) {
        self.has_user_edits = true;
        for item in &mut self.items {
            item.quantity = item.original_quantity();
            item.color_allocations.clear();
        }
        self.tip_allocations.clear();
    }

    /// Add a tip amount to the active color
    pub fn increment_tip(&mut self, amount: f64) {
        let Some(color) = self.active_color.clone() else {
            return;
        };
        self.has_user_edits = true;
        let entry = self.tip_allocations.entry(color).or_insert(0.0);
        *entry = round2(*entry + amount);
    }

    /// Set the combined charge total, adjusting the service-charge entry
    ///
    /// The delta lands on the first service charge when one exists, on the
    /// last charge otherwise. An empty charge list gets a new service charge.
    pub fn change_charges_total(&mut self, next_total: f64) {
        let target = round2(next_total.max(0.0));
        if self.charges.is_empty() {
            self.charges.push(BillCharge {
                label: "Service Charge".to_string(),
                amount: target,
            });
            self.has_user_edits = true;
            return;
        }
        let current: f64 = self.charges.iter().map(|c| c.amount).sum();
        let delta = round2(target - current);
        if delta.abs() < 0.0001 {
            return;
        }
        let idx = self
            .charges
            .iter()
            .position(|c| service_charge_pattern().is_match(&c.label))
            .unwrap_or(self.charges.len() - 1);
        self.charges[idx].amount = round2(self.charges[idx].amount + delta);
        self.has_user_edits = true;
        debug!(target, delta, "adjusted charges total");
    }

    pub fn change_item_price(&mut self, index: usize, unit_price: f64) -> Result<()> {
        self.item_mut(index)?.unit_price = unit_price;
        self.has_user_edits = true;
        Ok(())
    }

    /// Set the item's original quantity; remaining quantity is what is left
    /// after existing allocations
    pub fn change_item_quantity(&mut self, index: usize, original_quantity: u32) -> Result<()> {
        let item = self.item_mut(index)?;
        let allocated = item.allocated_quantity();
        item.quantity = original_quantity.saturating_sub(allocated);
        self.has_user_edits = true;
        Ok(())
    }

    pub fn change_item_description(&mut self, index: usize, description: &str) -> Result<()> {
        self.item_mut(index)?.description = description.to_string();
        self.has_user_edits = true;
        Ok(())
    }

    pub fn add_empty_item(&mut self) {
        self.items.push(BillItem::new("", 1, 0.0));
        self.has_user_edits = true;
    }

    pub fn delete_item(&mut self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            return Err(Error::InvalidData(format!(
                "item index {index} out of range ({} items)",
                self.items.len()
            )));
        }
        self.items.remove(index);
        self.has_user_edits = true;
        Ok(())
    }

    /// Colors currently in play, bounded by the person count
    pub fn visible_colors(&self) -> Vec<String> {
        let count = (self.num_persons.max(1) as usize).min(self.user_colors.len());
        self.user_colors[..count].to_vec()
    }

    /// Per-color totals: allocated items, split charges, and tips
    pub fn totals_by_color(&self) -> BTreeMap<String, f64> {
        let visible = self.visible_colors();
        let mut totals: BTreeMap<String, f64> = visible.iter().map(|c| (c.clone(), 0.0)).collect();

        for item in &self.items {
            for (color, qty) in &item.color_allocations {
                if let Some(total) = totals.get_mut(color) {
                    *total = round2(*total + f64::from(*qty) * item.unit_price);
                }
            }
        }

        let service_total: f64 = self
            .charges
            .iter()
            .filter(|c| c.is_service_charge())
            .map(|c| c.amount)
            .sum();
        if service_total != 0.0 {
            if self.split_charges_evenly && !visible.is_empty() {
                let per = service_total / visible.len() as f64;
                for total in totals.values_mut() {
                    *total = round2(*total + per);
                }
            } else if let Some(color) = &self.selected_charge_color {
                if let Some(total) = totals.get_mut(color) {
                    *total = round2(*total + service_total);
                }
            }
        }

        for (color, tip) in &self.tip_allocations {
            if let Some(total) = totals.get_mut(color) {
                *total = round2(*total + tip);
            }
        }

        if self.tip_input > 0.0 {
            if self.split_tip_evenly && !visible.is_empty() {
                let per = self.tip_input / visible.len() as f64;
                for total in totals.values_mut() {
                    *total = round2(*total + per);
                }
            } else if let Some(color) = &self.selected_tip_color {
                if let Some(total) = totals.get_mut(color) {
                    *total = round2(*total + self.tip_input);
                }
            }
        }

        if self.split_evenly && !visible.is_empty() {
            let remaining: f64 = self
                .items
                .iter()
                .map(|i| f64::from(i.quantity) * i.unit_price)
                .sum();
            if remaining > 0.0 {
                let per = remaining / visible.len() as f64;
                for total in totals.values_mut() {
                    *total = round2(*total + per);
                }
            }
        }

        totals
    }

    /// Detected total when available, otherwise the allocated item sum
    pub fn subtotal(&self) -> f64 {
        if let Some(total) = self.net_total {
            if total > 0.0 {
                return total;
            }
        }
        self.items
            .iter()
            .map(|i| f64::from(i.allocated_quantity()) * i.unit_price)
            .sum()
    }

    pub fn tip_total(&self) -> f64 {
        self.tip_allocations.values().sum()
    }

    pub fn grand_total(&self) -> f64 {
        round2(self.subtotal() + self.tip_total() + self.tip_input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_items() -> BillState {
        let mut state = BillState::new();
        state.publish(ParseResult {
            items: vec![
                BillItem::new("DOSA", 2, 90.0),
                BillItem::new("COFFEE", 3, 40.0),
            ],
            charges: vec![BillCharge {
                label: "Service Charge".to_string(),
                amount: 30.0,
            }],
            net_total: Some(330.0),
        });
        state
    }

    #[test]
    fn test_allocate_preserves_quantity_invariant() {
        let mut state = state_with_items();
        let original = state.items[0].original_quantity();
        state.allocate_one(0).unwrap();
        state.allocate_one(0).unwrap();
        // A third allocation has nothing left to take
        state.allocate_one(0).unwrap();
        let item = &state.items[0];
        assert_eq!(item.quantity, 0);
        assert_eq!(item.allocated_quantity(), 2);
        assert_eq!(item.original_quantity(), original);
    }

    #[test]
    fn test_deallocate_round_trip() {
        let mut state = state_with_items();
        let color = state.active_color.clone().unwrap();
        state.allocate_one(1).unwrap();
        state.deallocate_one(1, &color).unwrap();
        let item = &state.items[1];
        assert_eq!(item.quantity, 3);
        assert!(item.color_allocations.is_empty());
        // Deallocating a color with no units is a no-op
        state.deallocate_one(1, "#ffffff").unwrap();
        assert_eq!(state.items[1].quantity, 3);
    }

    #[test]
    fn test_override_moves_unit_between_colors() {
        let mut state = state_with_items();
        let first = state.active_color.clone().unwrap();
        state.allocate_one(0).unwrap();
        let second = state.user_colors[1].clone();
        state.active_color = Some(second.clone());
        state.override_allocation(0, &first).unwrap();
        let item = &state.items[0];
        assert_eq!(item.color_allocations.get(&second), Some(&1));
        assert!(!item.color_allocations.contains_key(&first));
        assert_eq!(item.original_quantity(), 2);
    }

    #[test]
    fn test_undo_allocations_restores_quantities() {
        let mut state = state_with_items();
        state.allocate_one(0).unwrap();
        state.allocate_one(1).unwrap();
        state.increment_tip(15.0);
        state.undo_allocations();
        assert_eq!(state.items[0].quantity, 2);
        assert_eq!(state.items[1].quantity, 3);
        assert!(state.items.iter().all(|i| i.color_allocations.is_empty()));
        assert!(state.tip_allocations.is_empty());
    }

    #[test]
    fn test_user_edit_flag_tracks_every_manual_mutation() {
        let mutations: Vec<fn(&mut BillState)> = vec![
            |s| s.allocate_one(0).unwrap(),
            |s| s.change_item_price(0, 95.0).unwrap(),
            |s| s.change_item_quantity(0, 4).unwrap(),
            |s| s.change_item_description(0, "PLAIN DOSA").unwrap(),
            |s| s.add_empty_item(),
            |s| s.delete_item(0).unwrap(),
            |s| s.change_charges_total(45.0),
            |s| s.increment_tip(10.0),
        ];
        for mutate in mutations {
            let mut state = state_with_items();
            assert!(!state.has_user_edits());
            mutate(&mut state);
            assert!(state.has_user_edits());
        }

        // Publishing an engine result is not a user edit
        let state = state_with_items();
        assert!(!state.has_user_edits());
    }

    #[test]
    fn test_deallocate_tolerates_zero_allocation_entry() {
        let mut state = state_with_items();
        let color = state.active_color.clone().unwrap();
        state.items[0].color_allocations.insert(color.clone(), 0);
        state.deallocate_one(0, &color).unwrap();
        assert_eq!(state.items[0].quantity, 2);
        let second = state.user_colors[1].clone();
        state.active_color = Some(second.clone());
        state.override_allocation(0, &color).unwrap();
        assert!(!state.items[0].color_allocations.contains_key(&second));
    }

    #[test]
    fn test_change_item_quantity_respects_allocations() {
        let mut state = state_with_items();
        state.allocate_one(0).unwrap();
        state.change_item_quantity(0, 5).unwrap();
        assert_eq!(state.items[0].quantity, 4);
        assert_eq!(state.items[0].original_quantity(), 5);
        // Shrinking below the allocated count clamps at zero remaining
        state.change_item_quantity(0, 1).unwrap();
        assert_eq!(state.items[0].quantity, 0);
    }

    #[test]
    fn test_change_charges_total_adjusts_service_charge() {
        let mut state = state_with_items();
        state.change_charges_total(45.0);
        assert!((state.charges[0].amount - 45.0).abs() < 0.005);

        state.charges.clear();
        state.change_charges_total(12.0);
        assert_eq!(state.charges[0].label, "Service Charge");
        assert!((state.charges[0].amount - 12.0).abs() < 0.005);
    }

    #[test]
    fn test_totals_by_color_split_service_evenly() {
        let mut state = state_with_items();
        state.num_persons = 2;
        state.allocate_one(0).unwrap();
        let totals = state.totals_by_color();
        let visible = state.visible_colors();
        // First color carries one DOSA plus half the service charge
        assert!((totals[&visible[0]] - (90.0 + 15.0)).abs() < 0.005);
        assert!((totals[&visible[1]] - 15.0).abs() < 0.005);
    }

    #[test]
    fn test_grand_total_includes_tips() {
        let mut state = state_with_items();
        state.increment_tip(20.0);
        state.tip_input = 10.0;
        assert!((state.grand_total() - 360.0).abs() < 0.005);
    }

    #[test]
    fn test_index_out_of_range_is_an_error() {
        let mut state = state_with_items();
        assert!(state.change_item_price(9, 1.0).is_err());
        assert!(state.delete_item(9).is_err());
    }

    #[test]
    fn test_deleting_and_adding_items() {
        let mut state = state_with_items();
        state.add_empty_item();
        assert_eq!(state.items.len(), 3);
        state.delete_item(0).unwrap();
        assert_eq!(state.items[0].description, "COFFEE");
    }
}
