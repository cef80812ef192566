use super::result_set::ResultSet;

/// Results of a multi-statement command, one table per statement that returned
/// columns, named `Table`, `Table1`, `Table2`, ...
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    tables: Vec<(String, ResultSet)>,
}

impl TableSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the next table would get.
    fn next_name(&self) -> String {
        match self.tables.len() {
            0 => "Table".to_string(),
            n => format!("Table{n}"),
        }
    }

    /// Append a table under the next generated name.
    pub fn push(&mut self, table: ResultSet) {
        let name = self.next_name();
        self.tables.push((name, table));
    }

    /// Look a table up by name (ASCII case-insensitive).
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&ResultSet> {
        self.tables
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, t)| t)
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ResultSet> {
        self.tables.get(index).map(|(_, t)| t)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResultSet)> {
        self.tables.iter().map(|(n, t)| (n.as_str(), t))
    }

    /// Consume the set, keeping only the first table.
    #[must_use]
    pub fn into_first(self) -> Option<ResultSet> {
        self.tables.into_iter().next().map(|(_, t)| t)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<ResultSet> for TableSet {
    fn from_iter<I: IntoIterator<Item = ResultSet>>(iter: I) -> Self {
        let mut set = TableSet::new();
        for table in iter {
            set.push(table);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_dataset_convention() {
        let set: TableSet = vec![ResultSet::default(), ResultSet::default(), ResultSet::default()]
            .into_iter()
            .collect();
        let names: Vec<&str> = set.names().collect();
        assert_eq!(names, vec!["Table", "Table1", "Table2"]);
        assert!(set.table("table1").is_some());
        assert!(set.table("Table3").is_none());
    }
}
