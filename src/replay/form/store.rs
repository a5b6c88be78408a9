// SPDX-License-Identifier: MIT

//! Runtime form state with derived-field recomputation

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::schema::FieldDefinition;
use crate::replay::formula::{FieldValues, Formula};
use crate::runtime::error::FormError;

/// A derived field ready for evaluation
#[derive(Debug, Clone)]
struct Derivation {
    field_id: String,
    expression: String,
    /// `None` when the expression does not parse; it always yields ""
    formula: Option<Formula>,
}

/// Field values for one form, keeping derived fields up to date
#[derive(Debug, Clone)]
pub struct FormState {
    fields: Vec<FieldDefinition>,
    /// Derived fields, dependencies first
    derivations: Vec<Derivation>,
    values: FieldValues,
    prefill_applied: bool,
}

impl FormState {
    /// Build the form, ordering derived fields so that chained derivations
    /// see up-to-date inputs. Cyclic derivations are rejected.
    pub fn new(fields: Vec<FieldDefinition>) -> Result<Self, FormError> {
        let derivations = resolve_derivations(&fields)?;
        let mut state = Self {
            fields,
            derivations,
            values: FieldValues::new(),
            prefill_applied: false,
        };
        state.recompute();
        Ok(state)
    }

    /// Seed user-entered values (e.g. a saved draft); read-only ids are ignored
    pub fn seed(&mut self, values: &FieldValues) {
        for (id, value) in values {
            match self.field(id).map(FieldDefinition::is_read_only) {
                Some(false) => {
                    self.values.insert(id.clone(), value.clone());
                }
                Some(true) => log::debug!("Ignoring seeded value for read-only field '{}'", id),
                None => log::debug!("Ignoring seeded value for unknown field '{}'", id),
            }
        }
        self.recompute();
    }

    /// Populate prefilled fields from a profile document, once.
    /// Returns the ids that received a value.
    pub fn apply_prefill(&mut self, profile: &Value) -> Vec<String> {
        if self.prefill_applied {
            log::debug!("Prefill already applied, skipping");
            return Vec::new();
        }
        self.prefill_applied = true;

        let mut filled = Vec::new();
        for def in &self.fields {
            let Some(prefill) = &def.prefill else {
                continue;
            };
            match get_path(profile, &prefill.source_key) {
                Some(value) if !value.is_null() => {
                    self.values.insert(def.id.clone(), value.clone());
                    filled.push(def.id.clone());
                }
                _ => log::debug!(
                    "Profile has no value at '{}' for field '{}'",
                    prefill.source_key,
                    def.id
                ),
            }
        }

        self.recompute();
        filled
    }

    /// Set a user-editable field. Returns the derived ids whose value changed.
    pub fn set_value(&mut self, id: &str, value: Value) -> Result<Vec<String>, FormError> {
        let def = self
            .field(id)
            .ok_or_else(|| FormError::UnknownField(id.to_string()))?;
        if def.is_read_only() {
            return Err(FormError::ReadOnlyField(id.to_string()));
        }

        if self.values.get(id) == Some(&value) {
            return Ok(Vec::new());
        }
        self.values.insert(id.to_string(), value);
        Ok(self.recompute())
    }

    /// Re-evaluate every derived field. Returns the ids whose value changed.
    pub fn recompute(&mut self) -> Vec<String> {
        let mut changed = Vec::new();

        for derivation in &self.derivations {
            let result = match &derivation.formula {
                Some(formula) => formula.evaluate(&self.values),
                None => String::new(),
            };
            let new_value = Value::String(result);
            if self.values.get(&derivation.field_id) != Some(&new_value) {
                log::debug!(
                    "Derived field '{}' = {} ({})",
                    derivation.field_id,
                    new_value,
                    derivation.expression
                );
                self.values
                    .insert(derivation.field_id.clone(), new_value);
                changed.push(derivation.field_id.clone());
            }
        }

        changed
    }

    pub fn field(&self, id: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn value(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    /// Derived field ids in evaluation order
    pub fn derivation_order(&self) -> Vec<&str> {
        self.derivations
            .iter()
            .map(|d| d.field_id.as_str())
            .collect()
    }

    /// Required fields that are still empty, in definition order
    pub fn missing_required(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .filter(|f| match self.values.get(&f.id) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.trim().is_empty(),
                Some(_) => false,
            })
            .map(|f| f.id.as_str())
            .collect()
    }
}

/// Order derived fields so each one comes after the derived fields it reads
fn resolve_derivations(fields: &[FieldDefinition]) -> Result<Vec<Derivation>, FormError> {
    let mut pending: HashMap<&str, Derivation> = HashMap::new();
    let mut deps: HashMap<&str, Vec<String>> = HashMap::new();
    let mut declared: Vec<&str> = Vec::new();

    for def in fields {
        let Some(derivation) = &def.derived else {
            continue;
        };
        let formula = match Formula::compile(&derivation.expression) {
            Ok(f) => Some(f),
            Err(e) => {
                log::warn!(
                    "Derived field '{}' has an invalid formula '{}': {}",
                    def.id,
                    derivation.expression,
                    e
                );
                None
            }
        };
        let refs = formula.as_ref().map(Formula::references).unwrap_or_default();
        deps.insert(def.id.as_str(), refs);
        declared.push(def.id.as_str());
        pending.insert(
            def.id.as_str(),
            Derivation {
                field_id: def.id.clone(),
                expression: derivation.expression.clone(),
                formula,
            },
        );
    }

    let derived_ids: HashSet<&str> = declared.iter().copied().collect();
    let mut order: Vec<&str> = Vec::new();
    let mut done: HashSet<&str> = HashSet::new();

    for id in &declared {
        let mut path = Vec::new();
        visit(*id, &deps, &derived_ids, &mut done, &mut path, &mut order)?;
    }

    Ok(order
        .into_iter()
        .filter_map(|id| pending.remove(id))
        .collect())
}

/// Depth-first visit pushing dependencies before dependents
fn visit<'a>(
    id: &'a str,
    deps: &HashMap<&'a str, Vec<String>>,
    derived_ids: &HashSet<&'a str>,
    done: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
    order: &mut Vec<&'a str>,
) -> Result<(), FormError> {
    if done.contains(id) {
        return Ok(());
    }
    if let Some(pos) = path.iter().position(|p| *p == id) {
        let mut cycle: Vec<String> = path[pos..].iter().map(|s| s.to_string()).collect();
        cycle.push(id.to_string());
        return Err(FormError::CyclicDerivation(cycle));
    }

    path.push(id);
    if let Some(refs) = deps.get(id) {
        for dep in refs {
            if let Some(dep_id) = derived_ids.get(dep.as_str()) {
                visit(*dep_id, deps, derived_ids, done, path, order)?;
            }
        }
    }
    path.pop();

    done.insert(id);
    order.push(id);
    Ok(())
}

/// Walk a dot path (e.g. "department.name") through a JSON document
fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::form::schema::FieldType;
    use serde_json::json;

    fn travel_form() -> FormState {
        FormState::new(vec![
            FieldDefinition::new("start_date", "Start", FieldType::Date).required(),
            FieldDefinition::new("end_date", "End", FieldType::Date).required(),
            FieldDefinition::new("total_days", "Days", FieldType::Number)
                .derived("daysBetween(start_date, end_date)"),
            FieldDefinition::new("employee", "Employee", FieldType::Text)
                .prefilled("profile.name"),
        ])
        .unwrap()
    }

    #[test]
    fn test_derived_field_recomputes_on_input_change() {
        let mut form = travel_form();
        assert_eq!(form.value("total_days"), Some(&json!("")));

        form.set_value("start_date", json!("2024-01-01")).unwrap();
        assert_eq!(form.value("total_days"), Some(&json!("")));

        let changed = form.set_value("end_date", json!("2024-01-05")).unwrap();
        assert_eq!(changed, vec!["total_days".to_string()]);
        assert_eq!(form.value("total_days"), Some(&json!("5")));
    }

    #[test]
    fn test_unchanged_value_triggers_nothing() {
        let mut form = travel_form();
        form.set_value("start_date", json!("2024-01-01")).unwrap();
        form.set_value("end_date", json!("2024-01-01")).unwrap();

        let changed = form.set_value("end_date", json!("2024-01-01")).unwrap();
        assert!(changed.is_empty());
        assert_eq!(form.value("total_days"), Some(&json!("1")));
    }

    #[test]
    fn test_read_only_fields_reject_edits() {
        let mut form = travel_form();
        assert_eq!(
            form.set_value("total_days", json!("99")),
            Err(FormError::ReadOnlyField("total_days".to_string()))
        );
        assert_eq!(
            form.set_value("employee", json!("Mallory")),
            Err(FormError::ReadOnlyField("employee".to_string()))
        );
        assert_eq!(
            form.set_value("nope", json!(1)),
            Err(FormError::UnknownField("nope".to_string()))
        );
    }

    #[test]
    fn test_prefill_applies_once() {
        let mut form = travel_form();
        let filled = form.apply_prefill(&json!({"profile": {"name": "Ada"}}));
        assert_eq!(filled, vec!["employee".to_string()]);
        assert_eq!(form.value("employee"), Some(&json!("Ada")));

        let filled = form.apply_prefill(&json!({"profile": {"name": "Grace"}}));
        assert!(filled.is_empty());
        assert_eq!(form.value("employee"), Some(&json!("Ada")));
    }

    #[test]
    fn test_seed_ignores_read_only() {
        let mut form = travel_form();
        let values: FieldValues = [
            ("start_date".to_string(), json!("2024-03-01")),
            ("end_date".to_string(), json!("2024-03-02")),
            ("total_days".to_string(), json!("100")),
        ]
        .into_iter()
        .collect();
        form.seed(&values);
        assert_eq!(form.value("total_days"), Some(&json!("2")));
    }

    #[test]
    fn test_chained_derivations_resolve_in_dependency_order() {
        // `label` is declared before the field it reads
        let mut form = FormState::new(vec![
            FieldDefinition::new("label", "Label", FieldType::Text)
                .derived("concat('Total: ', total)"),
            FieldDefinition::new("total", "Total", FieldType::Number)
                .derived("round(sum(net, vat), 2)"),
            FieldDefinition::new("net", "Net", FieldType::Number),
            FieldDefinition::new("vat", "VAT", FieldType::Number),
        ])
        .unwrap();

        assert_eq!(form.derivation_order(), vec!["total", "label"]);

        form.set_value("net", json!(100)).unwrap();
        form.set_value("vat", json!("19.999")).unwrap();
        assert_eq!(form.value("total"), Some(&json!("120")));
        assert_eq!(form.value("label"), Some(&json!("Total: 120")));
    }

    #[test]
    fn test_cyclic_derivation_rejected() {
        let result = FormState::new(vec![
            FieldDefinition::new("a", "A", FieldType::Text).derived("concat(b)"),
            FieldDefinition::new("b", "B", FieldType::Text).derived("concat(a)"),
        ]);
        assert_eq!(
            result.err(),
            Some(FormError::CyclicDerivation(vec![
                "a".to_string(),
                "b".to_string(),
                "a".to_string()
            ]))
        );
    }

    #[test]
    fn test_self_reference_rejected() {
        let result = FormState::new(vec![
            FieldDefinition::new("a", "A", FieldType::Text).derived("a")
        ]);
        assert!(matches!(result, Err(FormError::CyclicDerivation(_))));
    }

    #[test]
    fn test_invalid_formula_yields_empty() {
        let mut form = FormState::new(vec![
            FieldDefinition::new("x", "X", FieldType::Text),
            FieldDefinition::new("y", "Y", FieldType::Text).derived("concat(x"),
        ])
        .unwrap();
        form.set_value("x", json!("hello")).unwrap();
        assert_eq!(form.value("y"), Some(&json!("")));
    }

    #[test]
    fn test_missing_required() {
        let mut form = travel_form();
        assert_eq!(form.missing_required(), vec!["start_date", "end_date"]);

        form.set_value("start_date", json!("2024-01-01")).unwrap();
        form.set_value("end_date", json!("   ")).unwrap();
        assert_eq!(form.missing_required(), vec!["end_date"]);
    }
}
