//! Custom field lifecycle: label generation, add, remove, update.

use tracing::debug;

use super::{CustomField, FieldChange, TemplateModel};
use crate::error::BadgeError;
use crate::format::FormattingRecord;
use crate::position::{PositionedElement, clamp_axis};

pub const FIELD_LABEL_PREFIX: &str = "field";

/// Next generated label: `field{max + 1}` over labels shaped `field<N>`.
///
/// Gaps are never reused, so removing `field2` from `field1..field3` and
/// adding again yields `field4`. Suffixes too large to increment are
/// ignored.
pub fn next_field_label<'a>(labels: impl IntoIterator<Item = &'a str>) -> String {
    let next = labels
        .into_iter()
        .filter_map(|label| label.strip_prefix(FIELD_LABEL_PREFIX))
        .filter(|suffix| !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .filter_map(|n| n.checked_add(1))
        .max()
        .unwrap_or(1);
    format!("{FIELD_LABEL_PREFIX}{next}")
}

impl TemplateModel {
    /// Add a field with a generated label, default format, and a position
    /// staggered below the existing fields.
    pub fn add_field(&mut self) -> &CustomField {
        self.add_field_with_text("")
    }

    /// [`add_field`](Self::add_field) with prefilled text.
    pub fn add_field_with_text(&mut self, text: &str) -> &CustomField {
        let label = next_field_label(self.fields.iter().map(|f| f.label.as_str()));
        let y = clamp_axis((self.fields.len() as f64 + 1.0) * self.field_y_step);
        let field = CustomField {
            id: uuid::Uuid::new_v4().to_string(),
            label,
            format: FormattingRecord::new(text),
            position: PositionedElement::at(0.0, y),
        };
        debug!(id = %field.id, label = %field.label, "adding field");
        self.fields.push(field);
        let index = self.fields.len() - 1;
        &self.fields[index]
    }

    /// Remove a field by id. Other fields keep their positions.
    pub fn remove_field(&mut self, id: &str) -> Result<CustomField, BadgeError> {
        let index = self
            .fields
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| BadgeError::UnknownField(id.to_string()))?;
        Ok(self.fields.remove(index))
    }

    pub fn field(&self, id: &str) -> Option<&CustomField> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn field_mut(&mut self, id: &str) -> Option<&mut CustomField> {
        self.fields.iter_mut().find(|f| f.id == id)
    }

    /// Apply changes coming from a field's editing surface.
    pub fn apply_field_changes(
        &mut self,
        id: &str,
        changes: &[FieldChange],
    ) -> Result<(), BadgeError> {
        let field = self
            .field_mut(id)
            .ok_or_else(|| BadgeError::UnknownField(id.to_string()))?;
        for change in changes {
            field.apply(change);
        }
        Ok(())
    }

    /// Rename a field. Labels are free text; only generation follows `fieldN`.
    pub fn rename_field(&mut self, id: &str, label: impl Into<String>) -> Result<(), BadgeError> {
        let field = self
            .field_mut(id)
            .ok_or_else(|| BadgeError::UnknownField(id.to_string()))?;
        field.label = label.into();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatChange;

    #[test]
    fn test_next_label_empty() {
        assert_eq!(next_field_label(Vec::<&str>::new()), "field1");
    }

    #[test]
    fn test_next_label_skips_gaps() {
        assert_eq!(next_field_label(["field1", "field3"]), "field4");
    }

    #[test]
    fn test_next_label_ignores_other_labels() {
        assert_eq!(
            next_field_label(["Name", "field", "field2b", "fieldx", "field7", "Field9"]),
            "field8"
        );
    }

    #[test]
    fn test_next_label_ignores_suffix_at_integer_limit() {
        assert_eq!(next_field_label(["field18446744073709551615", "field2"]), "field3");
        assert_eq!(next_field_label(["field99999999999999999999999"]), "field1");

        let mut model = TemplateModel::new();
        let id = model.add_field().id.clone();
        model.rename_field(&id, "field18446744073709551615").unwrap();
        assert_eq!(model.add_field().label, "field1");
    }

    #[test]
    fn test_add_first_field() {
        let mut model = TemplateModel::new();
        let field = model.add_field().clone();
        assert_eq!(field.label, "field1");
        assert_eq!(field.position, PositionedElement::at(0.0, 5.0));
        assert_eq!(field.format, FormattingRecord::default());
        assert!(!field.id.is_empty());
    }

    #[test]
    fn test_add_staggers_vertically() {
        let mut model = TemplateModel::new();
        model.add_field();
        model.add_field();
        let third = model.add_field().clone();
        assert_eq!(third.position.y, 15.0);
    }

    #[test]
    fn test_stagger_is_clamped() {
        let mut model = TemplateModel::new();
        model.field_y_step = 40.0;
        for _ in 0..3 {
            model.add_field();
        }
        assert_eq!(model.fields[2].position.y, 100.0);
    }

    #[test]
    fn test_remove_then_add_does_not_reuse_label() {
        let mut model = TemplateModel::new();
        model.add_field();
        let second = model.add_field().id.clone();
        model.add_field();
        let removed = model.remove_field(&second).unwrap();
        assert_eq!(removed.label, "field2");
        assert_eq!(model.add_field().label, "field4");
    }

    #[test]
    fn test_remove_keeps_other_positions() {
        let mut model = TemplateModel::new();
        let first = model.add_field().id.clone();
        model.add_field();
        model.add_field();
        let before: Vec<_> = model.fields[1..].iter().map(|f| f.position).collect();
        model.remove_field(&first).unwrap();
        let after: Vec<_> = model.fields.iter().map(|f| f.position).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_remove_unknown_field() {
        let mut model = TemplateModel::new();
        assert!(matches!(
            model.remove_field("nope"),
            Err(BadgeError::UnknownField(_))
        ));
    }

    #[test]
    fn test_apply_field_changes() {
        let mut model = TemplateModel::new();
        let id = model.add_field_with_text("Hello").id.clone();
        model
            .apply_field_changes(
                &id,
                &[
                    FieldChange::Format(FormatChange::Bold(true)),
                    FieldChange::Y(42.0),
                ],
            )
            .unwrap();
        let field = model.field(&id).unwrap();
        assert!(field.format.is_bold);
        assert_eq!(field.format.text, "Hello");
        assert_eq!(field.position.y, 42.0);
    }
}
