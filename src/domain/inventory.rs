//! Read-model types derived from the stored rows.
//!
//! Nothing here is persisted: `borrowed` and `borrow_count` are row counts
//! over `borrower_tool`, recomputed on every refresh.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Tool with the number of units currently lent out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub id: i32,
    pub name: String,
    pub stock: i32,
    pub borrowed: u64,
}

impl ToolInfo {
    /// Units still on the shelf. Zero while an understock has not been cascaded yet.
    pub fn available(&self) -> u64 {
        (self.stock.max(0) as u64).saturating_sub(self.borrowed)
    }

    pub fn has_available(&self) -> bool {
        i64::from(self.stock) > self.borrowed as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowedTool {
    pub id: i32,
    pub name: String,
    pub borrowed: u64,
}

impl From<&ToolInfo> for BorrowedTool {
    fn from(tool: &ToolInfo) -> Self {
        Self {
            id: tool.id,
            name: tool.name.clone(),
            borrowed: tool.borrowed,
        }
    }
}

/// A borrower annotated with how many units of one tool they hold
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerWithCount {
    pub id: i32,
    pub name: String,
    pub borrow_count: u64,
}

/// Last refreshed read model, shared by every list screen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub tools: Vec<ToolInfo>,
    pub borrowed_tools: Vec<BorrowedTool>,
}

impl InventorySnapshot {
    pub fn from_tools(tools: Vec<ToolInfo>) -> Self {
        let borrowed_tools = borrowed_tools(&tools);
        Self {
            tools,
            borrowed_tools,
        }
    }
}

/// Display form of a stored name: first character upper-cased, the rest lower-cased.
pub fn display_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Tools with units left come first; then case-insensitive name, then id.
pub fn compare_tools(a: &ToolInfo, b: &ToolInfo) -> Ordering {
    b.has_available()
        .cmp(&a.has_available())
        .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        .then_with(|| a.id.cmp(&b.id))
}

pub fn sort_tools(tools: &mut [ToolInfo]) {
    tools.sort_by(compare_tools);
}

pub fn borrowed_tools(tools: &[ToolInfo]) -> Vec<BorrowedTool> {
    tools
        .iter()
        .filter(|tool| tool.borrowed > 0)
        .map(BorrowedTool::from)
        .collect()
}

/// Count borrow rows per borrower id, keyed in ascending id order.
pub fn count_by_borrower(borrower_ids: impl IntoIterator<Item = i32>) -> BTreeMap<i32, u64> {
    let mut counts = BTreeMap::new();
    for id in borrower_ids {
        *counts.entry(id).or_insert(0) += 1;
    }
    counts
}
