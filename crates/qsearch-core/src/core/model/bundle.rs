use super::{BaseModel, ModelError, Topology};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

const CONTACT_ENVELOPE_COMPONENT: &str = "contact_envelope";
const TWIG_SEPARATOR: char = '@';

fn default_enabled() -> bool {
    true
}

/// A single observational input of a [`Bundle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A JSON parameter bundle describing a binary-system model.
///
/// Parameters are addressed by twigs: `@`-separated tags whose first tag is the
/// qualifier (e.g. `incl@binary@orbit@component`). A lookup twig matches a stored
/// parameter when the qualifiers agree and every remaining lookup tag appears among
/// the stored tags, so `incl@binary` resolves `incl@binary@orbit@component`.
///
/// Fields the engine does not understand are kept verbatim in `extra` and written
/// back out when the bundle is serialized for an optimizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub components: Vec<String>,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.components.push(component.into());
        self
    }

    pub fn with_dataset(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.datasets.push(Dataset {
            name: name.into(),
            enabled,
            extra: Map::new(),
        });
        self
    }

    pub fn with_parameter(mut self, twig: impl Into<String>, value: f64) -> Self {
        self.parameters.insert(twig.into(), value);
        self
    }

    pub fn dataset(&self, name: &str) -> Option<&Dataset> {
        self.datasets.iter().find(|d| d.name == name)
    }

    fn resolve(&self, twig: &str) -> Result<String, ModelError> {
        if self.parameters.contains_key(twig) {
            return Ok(twig.to_string());
        }

        let matches: Vec<&String> = self
            .parameters
            .keys()
            .filter(|key| twig_matches(key, twig))
            .collect();

        match matches.as_slice() {
            [] => Err(ModelError::UnknownParameter(twig.to_string())),
            [key] => Ok((*key).clone()),
            _ => Err(ModelError::AmbiguousParameter {
                twig: twig.to_string(),
                matches: matches.len(),
            }),
        }
    }
}

fn twig_matches(key: &str, twig: &str) -> bool {
    let mut key_tags = key.split(TWIG_SEPARATOR);
    let mut twig_tags = twig.split(TWIG_SEPARATOR);

    match (key_tags.next(), twig_tags.next()) {
        (Some(qualifier), Some(wanted)) if qualifier == wanted => {}
        _ => return false,
    }

    let key_tags: Vec<&str> = key_tags.collect();
    twig_tags.all(|tag| key_tags.contains(&tag))
}

impl BaseModel for Bundle {
    fn topology(&self) -> Topology {
        if self
            .components
            .iter()
            .any(|c| c == CONTACT_ENVELOPE_COMPONENT)
        {
            Topology::Contact
        } else {
            Topology::Detached
        }
    }

    fn parameter(&self, twig: &str) -> Result<f64, ModelError> {
        let key = self.resolve(twig)?;
        Ok(self.parameters[&key])
    }

    fn set_parameter(&mut self, twig: &str, value: f64) -> Result<(), ModelError> {
        if !value.is_finite() {
            return Err(ModelError::InvalidValue {
                twig: twig.to_string(),
                value,
            });
        }
        let key = self.resolve(twig)?;
        self.parameters.insert(key, value);
        Ok(())
    }

    fn enable_inputs(&mut self, disabled: &[String]) -> Result<(), ModelError> {
        for name in disabled {
            if self.dataset(name).is_none() {
                debug!("Input '{}' is not present in the bundle; nothing to disable.", name);
            }
        }
        for dataset in &mut self.datasets {
            dataset.enabled = !disabled.contains(&dataset.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached_bundle() -> Bundle {
        Bundle::new()
            .with_component("binary")
            .with_component("primary")
            .with_component("secondary")
            .with_dataset("lc01", false)
            .with_dataset("mesh01", true)
            .with_parameter("q@binary@orbit@component", 0.5)
            .with_parameter("incl@binary@orbit@component", 85.0)
            .with_parameter("incl@primary@star@component", 85.0)
            .with_parameter("teffratio@binary@orbit@component", 0.9)
    }

    #[test]
    fn topology_is_contact_only_with_contact_envelope() {
        assert_eq!(detached_bundle().topology(), Topology::Detached);
        let contact = detached_bundle().with_component("contact_envelope");
        assert_eq!(contact.topology(), Topology::Contact);
    }

    #[test]
    fn set_parameter_resolves_partial_twig() {
        let mut bundle = detached_bundle();
        bundle.set_parameter("q", 0.32).unwrap();
        assert_eq!(bundle.parameters["q@binary@orbit@component"], 0.32);
        assert_eq!(bundle.parameter("q@binary").unwrap(), 0.32);
    }

    #[test]
    fn set_parameter_with_exact_key_wins_over_matching() {
        let mut bundle = detached_bundle();
        bundle
            .set_parameter("incl@primary@star@component", 80.0)
            .unwrap();
        assert_eq!(bundle.parameters["incl@primary@star@component"], 80.0);
        assert_eq!(bundle.parameters["incl@binary@orbit@component"], 85.0);
    }

    #[test]
    fn ambiguous_twig_is_rejected() {
        let mut bundle = detached_bundle();
        let result = bundle.set_parameter("incl", 80.0);
        assert_eq!(
            result,
            Err(ModelError::AmbiguousParameter {
                twig: "incl".to_string(),
                matches: 2
            })
        );
    }

    #[test]
    fn unknown_twig_is_rejected() {
        let mut bundle = detached_bundle();
        assert_eq!(
            bundle.set_parameter("ecc", 0.1),
            Err(ModelError::UnknownParameter("ecc".to_string()))
        );
    }

    #[test]
    fn qualifier_must_match_first_tag() {
        let bundle = detached_bundle();
        assert!(bundle.parameter("binary").is_err());
    }

    #[test]
    fn non_finite_value_is_rejected() {
        let mut bundle = detached_bundle();
        assert!(matches!(
            bundle.set_parameter("q", f64::NAN),
            Err(ModelError::InvalidValue { .. })
        ));
    }

    #[test]
    fn enable_inputs_enables_all_but_disabled() {
        let mut bundle = detached_bundle();
        bundle
            .enable_inputs(&["mesh01".to_string(), "rv01".to_string()])
            .unwrap();
        assert!(bundle.dataset("lc01").unwrap().enabled);
        assert!(!bundle.dataset("mesh01").unwrap().enabled);
    }

    #[test]
    fn clone_is_independent() {
        let original = detached_bundle();
        let mut clone = original.clone();
        clone.set_parameter("q", 0.9).unwrap();
        assert_eq!(original.parameter("q").unwrap(), 0.5);
        assert_eq!(clone.parameter("q").unwrap(), 0.9);
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let json = r#"{
            "components": ["binary"],
            "parameters": {"q@binary": 0.4},
            "datasets": [{"name": "lc01", "passband": "Johnson:V"}],
            "phoebe_version": "2.4.9"
        }"#;
        let bundle: Bundle = serde_json::from_str(json).unwrap();
        assert!(bundle.dataset("lc01").unwrap().enabled);
        let value = serde_json::to_value(&bundle).unwrap();
        assert_eq!(value["phoebe_version"], "2.4.9");
        assert_eq!(value["datasets"][0]["passband"], "Johnson:V");
    }
}
