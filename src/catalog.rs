use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, RwLock},
};

use log::info;

use crate::{
    error::DbError,
    heap::table::HeapTable,
    storage::schema::{FieldItem, Schema, Type},
    types::{Pod, ResultPod},
    utils::HandyRwLock,
};

/// Registry of the tables of the database, keyed by id and by name.
pub struct Catalog {
    table_id_map: HashMap<u32, Pod<HeapTable>>,
    table_name_map: HashMap<String, Pod<HeapTable>>,
    primary_keys: HashMap<u32, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            table_id_map: HashMap::new(),
            table_name_map: HashMap::new(),
            primary_keys: HashMap::new(),
        }
    }

    pub fn add_table(&mut self, table: Pod<HeapTable>, name: &str, primary_key: &str) {
        let table_id = table.rl().get_id();

        self.table_id_map.insert(table_id, Arc::clone(&table));
        self.table_name_map.insert(name.to_string(), table);
        if !primary_key.is_empty() {
            self.primary_keys.insert(table_id, primary_key.to_string());
        }
    }

    pub fn get_table(&self, table_id: &u32) -> ResultPod<HeapTable> {
        self.table_id_map
            .get(table_id)
            .map(Arc::clone)
            .ok_or_else(|| DbError::new(&format!("table {} not found", table_id)))
    }

    pub fn get_table_by_name(&self, name: &str) -> ResultPod<HeapTable> {
        self.table_name_map
            .get(name)
            .map(Arc::clone)
            .ok_or_else(|| DbError::new(&format!("table {} not found", name)))
    }

    pub fn get_schema(&self, table_id: &u32) -> Result<Arc<Schema>, DbError> {
        let table = self.get_table(table_id)?;
        let schema = table.rl().get_schema();
        Ok(schema)
    }

    pub fn get_primary_key(&self, table_id: &u32) -> Option<String> {
        self.primary_keys.get(table_id).cloned()
    }

    /// Load a line-oriented catalog file of the form
    /// `name (field1 type1, field2 type2 [pk], ...)` with
    /// `type ∈ {int, string}`, opening `<name>.dat` beside the catalog
    /// file for each table. Returns the names of the loaded tables.
    pub fn load_schema<P: AsRef<Path>>(&mut self, catalog_path: P) -> Result<Vec<String>, DbError> {
        let content = std::fs::read_to_string(&catalog_path)?;
        let dir = catalog_path
            .as_ref()
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let mut names = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let open = line
                .find('(')
                .ok_or_else(|| DbError::new(&format!("malformed catalog line: {}", line)))?;
            let close = line
                .rfind(')')
                .ok_or_else(|| DbError::new(&format!("malformed catalog line: {}", line)))?;

            let name = line[..open].trim();
            if name.is_empty() {
                return Err(DbError::new("empty table name in catalog file"));
            }

            let mut fields = Vec::new();
            let mut primary_key = String::new();
            for field_spec in line[open + 1..close].split(',') {
                let parts: Vec<&str> = field_spec.split_whitespace().collect();
                if parts.len() < 2 || parts.len() > 3 {
                    return Err(DbError::new(&format!(
                        "malformed field spec: {}",
                        field_spec
                    )));
                }

                if parts.len() == 3 {
                    if !parts[2].eq_ignore_ascii_case("pk") {
                        return Err(DbError::new(&format!(
                            "unexpected field attribute: {}",
                            parts[2]
                        )));
                    }
                    primary_key = parts[0].to_string();
                }

                fields.push(FieldItem {
                    field_name: parts[0].to_string(),
                    field_type: Type::parse(parts[1])?,
                });
            }
            if fields.is_empty() {
                return Err(DbError::new(&format!("table {} has no fields", name)));
            }

            let data_path = dir.join(format!("{}.dat", name));
            let data_path = data_path
                .to_str()
                .ok_or_else(|| DbError::new("invalid table path"))?
                .to_string();
            let table = HeapTable::new(&data_path, Schema::new(fields))?;

            info!("loaded table {} from catalog, file: {}", name, data_path);
            self.add_table(Arc::new(RwLock::new(table)), name, &primary_key);
            names.push(name.to_string());
        }

        Ok(names)
    }

    pub fn clear(&mut self) {
        self.table_id_map.clear();
        self.table_name_map.clear();
        self.primary_keys.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_load_schema() {
        let dir = std::env::temp_dir().join("heap_db_catalog_test");
        std::fs::create_dir_all(&dir).unwrap();

        let catalog_path = dir.join("catalog.txt");
        let mut f = std::fs::File::create(&catalog_path).unwrap();
        writeln!(f, "users (id int pk, name string)").unwrap();
        writeln!(f, "orders (id int, user_id int)").unwrap();

        let mut catalog = Catalog::new();
        let names = catalog.load_schema(&catalog_path).unwrap();
        assert_eq!(names, vec!["users".to_string(), "orders".to_string()]);

        let users = catalog.get_table_by_name("users").unwrap();
        let schema = users.rl().get_schema();
        assert_eq!(schema.fields.len(), 2);
        assert_eq!(schema.fields[0].field_type, Type::Int);
        assert_eq!(schema.fields[1].field_type, Type::String);

        let users_id = users.rl().get_id();
        assert_eq!(catalog.get_primary_key(&users_id), Some("id".to_string()));

        let orders = catalog.get_table_by_name("orders").unwrap();
        assert_eq!(catalog.get_primary_key(&orders.rl().get_id()), None);
    }

    #[test]
    fn test_load_schema_rejects_bad_input() {
        let dir = std::env::temp_dir().join("heap_db_catalog_bad_test");
        std::fs::create_dir_all(&dir).unwrap();

        let catalog_path = dir.join("catalog.txt");
        std::fs::write(&catalog_path, "t1 (id whatever)\n").unwrap();
        assert!(Catalog::new().load_schema(&catalog_path).is_err());

        std::fs::write(&catalog_path, " (id int)\n").unwrap();
        assert!(Catalog::new().load_schema(&catalog_path).is_err());

        std::fs::write(&catalog_path, "t1 id int\n").unwrap();
        assert!(Catalog::new().load_schema(&catalog_path).is_err());
    }
}
