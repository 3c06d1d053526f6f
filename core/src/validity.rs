use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Period during which a client's games count for rankings, in epoch seconds, both ends included.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub start: u64,
    pub end: u64,
}

impl ValidityWindow {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub const fn contains(self, epoch_seconds: u64) -> bool {
        self.start <= epoch_seconds && epoch_seconds <= self.end
    }
}

/// Client name to validity window. Loaded from configuration, never computed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidityTable {
    windows: HashMap<String, ValidityWindow>,
}

impl ValidityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `{"<software>": {"start": s, "end": e}, ...}`.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn insert(&mut self, software: impl Into<String>, window: ValidityWindow) {
        self.windows.insert(software.into(), window);
    }

    pub fn window(&self, software: &str) -> Option<ValidityWindow> {
        self.windows.get(software).copied()
    }

    /// Whether a game recorded by `software` at `epoch_seconds` falls in its window.
    ///
    /// Unknown clients are never covered.
    pub fn covers(&self, software: &str, epoch_seconds: u64) -> bool {
        self.window(software)
            .is_some_and(|window| window.contains(epoch_seconds))
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ValidityWindow)> + '_ {
        self.windows
            .iter()
            .map(|(software, &window)| (software.as_str(), window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"{
        "Arbiter": {"start": 0, "end": 4102415999},
        "0.97 beta": {"start": 0, "end": 0},
        "元3.1.9": {"start": 1721836800, "end": 1753459200}
    }"#;

    #[test]
    fn parses_and_looks_up_windows() {
        let table = ValidityTable::from_json(TABLE).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.window("元3.1.9"),
            Some(ValidityWindow::new(1_721_836_800, 1_753_459_200))
        );
        assert_eq!(table.window("Minesweeper X"), None);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let table = ValidityTable::from_json(TABLE).unwrap();
        assert!(table.covers("元3.1.9", 1_721_836_800));
        assert!(table.covers("元3.1.9", 1_753_459_200));
        assert!(!table.covers("元3.1.9", 1_753_459_201));
        assert!(table.covers("0.97 beta", 0));
        assert!(!table.covers("0.97 beta", 1_666_124_135));
        assert!(!table.covers("Viennasweeper", 0));
    }

    #[test]
    fn malformed_table_is_rejected() {
        assert!(ValidityTable::from_json(r#"{"Arbiter": {"start": 0}}"#).is_err());
        assert!(ValidityTable::from_json("[]").is_err());
    }

    #[test]
    fn insert_replaces_existing_window() {
        let mut table = ValidityTable::new();
        table.insert("Arbiter", ValidityWindow::new(0, 10));
        table.insert("Arbiter", ValidityWindow::new(5, 20));
        assert_eq!(table.iter().collect::<Vec<_>>(), vec![("Arbiter", ValidityWindow::new(5, 20))]);
    }
}
