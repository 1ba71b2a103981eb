//! Simulated supply-chain data for the Concord reference runtime.
//!
//! All data in this module is hardcoded and fictional. No external systems
//! are contacted. It stands in for the inventory, sales, and procurement
//! databases a production deployment would query.

use concord_contracts::agent::AgentDescriptor;

// ── Agent roster (mock directory) ─────────────────────────────────────────────

pub const INVENTORY_AGENT: &str = "Inventory Agent";
pub const SALES_AGENT: &str = "Sales Agent";
pub const SUPPLIER_AGENT: &str = "Supplier Agent";
pub const REPORT_AGENT: &str = "Report Agent";

/// The four worker agents the mock directory advertises.
pub fn supply_agents() -> Vec<AgentDescriptor> {
    vec![
        AgentDescriptor::new(
            INVENTORY_AGENT,
            "Inventory Planner",
            "Analyzes stock levels, inventory turnover, and fast or slow moving materials",
        )
        .with_capability("Summarize results"),
        AgentDescriptor::new(
            SALES_AGENT,
            "Sales Analyst",
            "Ranks products by units sold and revenue",
        ),
        AgentDescriptor::new(
            SUPPLIER_AGENT,
            "Procurement Specialist",
            "Looks up suppliers, lead times, and open purchase orders for a product",
        ),
        AgentDescriptor::new(
            REPORT_AGENT,
            "Reporting",
            "Turns analysis into slide decks and documents",
        )
        .with_capability("Generate output as PPT"),
    ]
}

// ── Material master (mock) ────────────────────────────────────────────────────

/// One row of the mock material master.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub code: &'static str,
    pub name: &'static str,
    pub on_hand: u32,
    pub monthly_usage: u32,
    pub units_sold_ytd: u32,
    pub supplier: &'static str,
    pub lead_time_days: u32,
}

impl Material {
    /// Annualized usage divided by stock on hand.
    pub fn turnover_rate(&self) -> f64 {
        if self.on_hand == 0 {
            return f64::INFINITY;
        }
        f64::from(self.monthly_usage * 12) / f64::from(self.on_hand)
    }
}

pub fn materials() -> Vec<Material> {
    vec![
        Material {
            code: "MAT-1001",
            name: "Widget-X",
            on_hand: 120,
            monthly_usage: 340,
            units_sold_ytd: 3_120,
            supplier: "Acme Components",
            lead_time_days: 14,
        },
        Material {
            code: "MAT-1002",
            name: "Gear-Assembly-7",
            on_hand: 900,
            monthly_usage: 45,
            units_sold_ytd: 410,
            supplier: "Northwind Metals",
            lead_time_days: 30,
        },
        Material {
            code: "MAT-1003",
            name: "Hex-Bolt-M8",
            on_hand: 5_000,
            monthly_usage: 2_100,
            units_sold_ytd: 19_800,
            supplier: "Fastenal Supply",
            lead_time_days: 7,
        },
        Material {
            code: "MAT-1004",
            name: "Bearing-6204",
            on_hand: 1_400,
            monthly_usage: 20,
            units_sold_ytd: 150,
            supplier: "Rollwell GmbH",
            lead_time_days: 45,
        },
    ]
}

/// Turnover above this rate counts as fast moving.
pub const FAST_TURNOVER: f64 = 4.0;

/// Turnover below this rate counts as slow moving.
pub const SLOW_TURNOVER: f64 = 1.0;

/// A plain-text turnover analysis over every material.
pub fn turnover_report() -> String {
    let mut lines = vec!["Inventory turnover analysis:".to_string()];
    let mut fast = Vec::new();
    let mut slow = Vec::new();
    for m in materials() {
        let rate = m.turnover_rate();
        lines.push(format!(
            "- {} ({}): on hand {}, monthly usage {}, turnover {:.1}x",
            m.name, m.code, m.on_hand, m.monthly_usage, rate
        ));
        if rate >= FAST_TURNOVER {
            fast.push(m.name);
        } else if rate < SLOW_TURNOVER {
            slow.push(m.name);
        }
    }
    lines.push(format!("Fast moving: {}", join_or_none(&fast)));
    lines.push(format!("Slow moving: {}", join_or_none(&slow)));
    lines.join("\n")
}

/// The material with the most units sold year to date.
pub fn top_selling_product() -> Option<Material> {
    materials().into_iter().max_by_key(|m| m.units_sold_ytd)
}

/// Case-insensitive lookup of the material named anywhere in `text`.
pub fn find_material_in(text: &str) -> Option<Material> {
    let lower = text.to_lowercase();
    materials()
        .into_iter()
        .find(|m| lower.contains(&m.name.to_lowercase()))
}

fn join_or_none(names: &[&str]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_seller_is_hex_bolt() {
        assert_eq!(top_selling_product().unwrap().name, "Hex-Bolt-M8");
    }

    #[test]
    fn report_flags_fast_and_slow_movers() {
        let report = turnover_report();
        assert!(report.contains("Fast moving: Widget-X, Hex-Bolt-M8"));
        assert!(report.contains("Slow moving: Gear-Assembly-7, Bearing-6204"));
    }

    #[test]
    fn material_lookup_is_case_insensitive() {
        assert_eq!(find_material_in("supplier for hex-bolt-m8?").unwrap().supplier, "Fastenal Supply");
        assert!(find_material_in("nothing here").is_none());
    }
}
