use crate::model::Amount;
use crate::report::Entry;
use serde::{Deserialize, Serialize};

/// The category of everything no keyword matches.
pub const OTHER: &str = "Other";

/// Entries that share a label or category, with the sum of their amounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub label: String,
    pub total: Amount,
    pub count: usize,
}

impl Group {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            total: Amount::ZERO,
            count: 0,
        }
    }

    fn add(&mut self, amount: Amount) {
        self.total += amount;
        self.count += 1;
    }
}

/// Groups entries whose labels are exactly equal, in the order each label first appears. Entries
/// without a label or an amount are left out.
pub fn group_by_label<E: Entry>(entries: &[E]) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    for entry in entries {
        let (Some(label), Some(amount)) = (entry.label(), entry.amount()) else {
            continue;
        };
        match groups.iter_mut().find(|g| g.label == label) {
            Some(group) => group.add(amount),
            None => {
                let mut group = Group::new(label);
                group.add(amount);
                groups.push(group);
            }
        }
    }
    groups
}

/// A category and the words that put a description into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub keywords: Vec<String>,
}

impl Category {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    fn matches(&self, lowercase_description: &str) -> bool {
        self.keywords
            .iter()
            .filter(|k| !k.is_empty())
            .any(|k| lowercase_description.contains(&k.to_lowercase()))
    }
}

/// Categorizes descriptions by keyword. Categories are tried in order and the first one with a
/// keyword contained in the description wins, ignoring case. `OTHER` catches the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable {
    categories: Vec<Category>,
}

impl Default for KeywordTable {
    fn default() -> Self {
        Self::new(vec![
            Category::new(
                "Food",
                &["supermercado", "mercado", "comida", "restaurante", "cafe", "panaderia"],
            ),
            Category::new(
                "Transport",
                &["gasolina", "taxi", "uber", "bus", "metro", "transporte"],
            ),
            Category::new("Housing", &["alquiler", "hipoteca", "renta", "comunidad"]),
            Category::new(
                "Utilities",
                &["luz", "agua", "gas", "internet", "telefono", "movil"],
            ),
            Category::new(
                "Health",
                &["farmacia", "medico", "hospital", "dentista", "seguro"],
            ),
            Category::new(
                "Leisure",
                &["cine", "netflix", "spotify", "viaje", "gimnasio", "ocio"],
            ),
            Category::new("Education", &["colegio", "curso", "libro", "universidad"]),
        ])
    }
}

impl KeywordTable {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn categorize(&self, description: &str) -> &str {
        let description = description.to_lowercase();
        self.categories
            .iter()
            .find(|c| c.matches(&description))
            .map(|c| c.name.as_str())
            .unwrap_or(OTHER)
    }

    /// Sums entries per category. Groups come in the table's order with `OTHER` last, and only
    /// categories that received at least one entry are returned. Entries without an amount are left
    /// out; entries without a description are `OTHER`.
    pub fn group_by_category<E: Entry>(&self, entries: &[E]) -> Vec<Group> {
        let mut groups: Vec<Group> = self
            .categories
            .iter()
            .map(|c| Group::new(c.name.as_str()))
            .chain(std::iter::once(Group::new(OTHER)))
            .collect();
        for entry in entries {
            let Some(amount) = entry.amount() else {
                continue;
            };
            let index = entry
                .label()
                .map(str::to_lowercase)
                .and_then(|d| self.categories.iter().position(|c| c.matches(&d)))
                .unwrap_or(self.categories.len());
            groups[index].add(amount);
        }
        groups.retain(|g| g.count > 0);
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::{amount, tx};

    #[test]
    fn test_categorize_by_keyword() {
        let table = KeywordTable::default();
        assert_eq!(table.categorize("Compra SUPERMERCADO Día"), "Food");
        assert_eq!(table.categorize("Uber al aeropuerto"), "Transport");
        assert_eq!(table.categorize("Regalo cumpleaños"), OTHER);
        assert_eq!(table.categorize(""), OTHER);
    }

    #[test]
    fn test_first_category_wins() {
        // "gas" is a utility but "gasolina" appears in Transport, which is earlier
        let table = KeywordTable::default();
        assert_eq!(table.categorize("Gasolina"), "Transport");
        // "seguro medico" would match Health; nothing earlier matches it
        assert_eq!(table.categorize("Seguro medico"), "Health");
        // "mercado" in a description about a cinema still goes to Food, the earlier category
        assert_eq!(table.categorize("Cine en el mercado"), "Food");
    }

    #[test]
    fn test_custom_table() {
        let table = KeywordTable::new(vec![Category::new("Pets", &["Veterinario"])]);
        assert_eq!(table.categorize("veterinario Toby"), "Pets");
        assert_eq!(table.categorize("supermercado"), OTHER);
    }

    #[test]
    fn test_group_by_category() {
        let table = KeywordTable::default();
        let entries = vec![
            tx(Some("10"), None, "Regalo"),
            tx(Some("30"), None, "Supermercado"),
            tx(Some("5"), None, "Taxi"),
            tx(None, None, "Panaderia"),
            tx(Some("20"), None, "Restaurante"),
        ];
        let groups = table.group_by_category(&entries);
        let labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["Food", "Transport", OTHER]);
        assert_eq!(groups[0].total, amount("50"));
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[2].total, amount("10"));
    }

    #[test]
    fn test_group_by_label() {
        let mut missing = tx(Some("99"), None, "");
        missing.description = None;
        let entries = vec![
            tx(Some("1"), None, "Netflix"),
            tx(Some("2"), None, "Luz"),
            missing,
            tx(Some("3"), None, "Netflix"),
            tx(None, None, "Luz"),
        ];
        let groups = group_by_label(&entries);
        assert_eq!(
            groups,
            vec![
                Group {
                    label: "Netflix".into(),
                    total: amount("4"),
                    count: 2
                },
                Group {
                    label: "Luz".into(),
                    total: amount("2"),
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn test_table_from_config_json() {
        let json = r#"[{"name": "Mascotas", "keywords": ["pienso", "veterinario"]}]"#;
        let table: KeywordTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.categories().len(), 1);
        assert_eq!(table.categorize("Pienso gato"), "Mascotas");
    }
}
