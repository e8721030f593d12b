//! # Cart Commands
//!
//! ## Output
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  $ gomarket-cli add --id 42 --title Mug --image-url img --price 12.5   │
//! │                                                                         │
//! │   #  ID    TITLE                QTY       PRICE       TOTAL             │
//! │   1  42    Mug                    1      $12.50      $12.50             │
//! │                                                                         │
//! │  1 line, 1 unit, subtotal $12.50                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use clap::Args;
use serde::Serialize;
use std::fmt::Write as _;
use tracing::debug;

use gomarket_cart::{CartHandle, CartSnapshot};
use gomarket_core::{CartTotals, LineItem, ProductDescriptor};

use crate::error::CliResult;

/// Arguments of `add`.
#[derive(Debug, Clone, Args)]
pub struct AddArgs {
    /// Product id
    #[arg(long)]
    pub id: String,

    /// Display name
    #[arg(long)]
    pub title: String,

    /// Image reference
    #[arg(long = "image-url", default_value = "")]
    pub image_url: String,

    /// Unit price
    #[arg(long)]
    pub price: f64,
}

/// Cart response including items and totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub revision: u64,
    pub items: Vec<LineItem>,
    pub totals: CartTotals,
}

impl From<&CartSnapshot> for CartResponse {
    fn from(snapshot: &CartSnapshot) -> Self {
        CartResponse {
            revision: snapshot.revision,
            items: snapshot.items.to_vec(),
            totals: snapshot.totals(),
        }
    }
}

pub fn add_to_cart(cart: &CartHandle, args: AddArgs) -> CliResult<()> {
    debug!(id = %args.id, price = args.price, "add_to_cart command");
    let product = ProductDescriptor::new(args.id, args.title, args.image_url, args.price)?;
    cart.add_to_cart(product)?;
    Ok(())
}

pub fn increment(cart: &CartHandle, id: &str) -> CliResult<()> {
    debug!(id = %id, "increment command");
    cart.increment(id)?;
    Ok(())
}

pub fn decrement(cart: &CartHandle, id: &str) -> CliResult<()> {
    debug!(id = %id, "decrement command");
    cart.decrement(id)?;
    Ok(())
}

/// Gets the current cart contents.
pub fn get_cart(cart: &CartHandle) -> CliResult<CartResponse> {
    Ok(CartResponse::from(&cart.snapshot()?))
}

// =============================================================================
// Rendering
// =============================================================================

pub fn render_cart(response: &CartResponse) -> String {
    if response.items.is_empty() {
        return "Cart is empty".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:<12} {:<24} {:>5} {:>11} {:>11}",
        "#", "ID", "TITLE", "QTY", "PRICE", "TOTAL"
    );
    for (position, item) in response.items.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>3}  {:<12} {:<24} {:>5} {:>11} {:>11}",
            position + 1,
            truncate(&item.id, 12),
            truncate(&item.title, 24),
            item.quantity,
            item.unit_price().to_string(),
            item.line_total().to_string()
        );
    }
    out.push('\n');
    out.push_str(&render_totals(&response.totals));
    out
}

pub fn render_totals(totals: &CartTotals) -> String {
    format!(
        "{} {}, {} {}, subtotal {}",
        totals.item_count,
        plural(totals.item_count as u64, "line"),
        totals.total_quantity,
        plural(totals.total_quantity, "unit"),
        totals.subtotal
    )
}

fn plural(n: u64, word: &str) -> String {
    if n == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, title: &str, price: f64, quantity: u32) -> LineItem {
        let mut item = ProductDescriptor::new(id, title, "", price)
            .unwrap()
            .into_line_item();
        item.quantity = quantity;
        item
    }

    #[test]
    fn test_render_empty_cart() {
        let empty: &[LineItem] = &[];
        let response = CartResponse {
            revision: 0,
            items: vec![],
            totals: CartTotals::from(empty),
        };
        assert_eq!(render_cart(&response), "Cart is empty");
        assert_eq!(render_totals(&response.totals), "0 lines, 0 units, subtotal $0.00");
    }

    #[test]
    fn test_render_cart_table() {
        let items = vec![item("42", "Mug", 12.5, 2), item("7", "Coffee", 3.0, 1)];
        let response = CartResponse {
            revision: 3,
            totals: CartTotals::from(&items[..]),
            items,
        };

        let table = render_cart(&response);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[0].contains("TITLE"));
        assert!(lines[1].contains("Mug") && lines[1].contains("$25.00"));
        assert!(lines[2].contains("Coffee"));
        assert!(table.ends_with("2 lines, 3 units, subtotal $28.00"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 12), "short");
        assert_eq!(truncate("a very long product title", 6), "a ver…");
    }
}
