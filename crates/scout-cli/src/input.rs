//! Entity file loading.

use crate::error::{CliError, Result};
use scout_domain::Entity;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Read entities from a JSON file, or from stdin when `path` is `-`.
pub fn load_entities(path: &Path) -> Result<Vec<Entity>> {
    let json = if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        fs::read_to_string(path).map_err(|e| {
            CliError::InvalidInput(format!("Cannot read {}: {}", path.display(), e))
        })?
    };

    parse_entities(&json)
}

/// Parse a JSON array of `{"id": ..., "attributes": {...}}` objects.
///
/// Ids must be non-empty and unique.
pub fn parse_entities(json: &str) -> Result<Vec<Entity>> {
    let entities: Vec<Entity> = serde_json::from_str(json)?;

    if entities.is_empty() {
        return Err(CliError::InvalidInput("No entities provided".to_string()));
    }

    let mut seen = HashSet::new();
    for entity in &entities {
        if entity.id.as_str().trim().is_empty() {
            return Err(CliError::InvalidInput("Entity with empty id".to_string()));
        }
        if !seen.insert(entity.id.as_str()) {
            return Err(CliError::InvalidInput(format!(
                "Duplicate entity id '{}'",
                entity.id
            )));
        }
    }

    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entities() {
        let entities = parse_entities(
            r#"[
                {"id": "acme", "attributes": {"company": "Acme", "city": "Springfield"}},
                {"id": "globex"}
            ]"#,
        )
        .unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].attribute("company"), Some("Acme"));
        assert!(entities[1].attributes.is_empty());
    }

    #[test]
    fn test_rejects_empty_and_duplicate() {
        assert!(matches!(
            parse_entities("[]"),
            Err(CliError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_entities(r#"[{"id": "a"}, {"id": "a"}]"#),
            Err(CliError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_entities(r#"[{"id": " "}]"#),
            Err(CliError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            parse_entities(r#"{"id": "a"}"#),
            Err(CliError::Serialization(_))
        ));
    }
}
