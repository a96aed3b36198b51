//! Simulator input model document.
//!
//! The simulator reads a flat list of objects: a class name followed by
//! comma-separated fields, terminated by `;`. `!` starts a comment that runs
//! to the end of the line. Documents are kept as an ordered object list and
//! rendered with a fixed layout, so the same object sequence always produces
//! the same bytes.

use crate::error::{SimError, SimResult, read_to_string};
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct ModelObject {
    class: String,
    fields: Vec<String>,
}

impl ModelObject {
    pub fn new<I, S>(class: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            class: class.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// Class names compare case-insensitively, as the simulator does.
    pub fn is(&self, class: &str) -> bool {
        self.class.eq_ignore_ascii_case(class)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// First field, which is the object name for every named class.
    pub fn name(&self) -> Option<&str> {
        self.field(0)
    }

    pub fn set_field(&mut self, index: usize, value: impl Into<String>) -> SimResult<()> {
        let slot = self
            .fields
            .get_mut(index)
            .ok_or(SimError::InvalidArg {
                what: "field index out of range",
            })?;
        *slot = value.into();
        Ok(())
    }

    pub fn number(&self, index: usize) -> Option<f64> {
        self.field(index).and_then(|f| f.trim().parse().ok())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelDocument {
    objects: Vec<ModelObject>,
}

impl ModelDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(path: &Path) -> SimResult<Self> {
        let text = read_to_string(path)?;
        Self::parse(&path.display().to_string(), &text)
    }

    pub fn parse(source_name: &str, text: &str) -> SimResult<Self> {
        let mut stripped = String::with_capacity(text.len());
        for line in text.lines() {
            let content = line.split('!').next().unwrap_or_default();
            stripped.push_str(content);
            stripped.push('\n');
        }

        let mut chunks: Vec<&str> = stripped.split(';').collect();
        let tail = chunks.pop().unwrap_or_default();
        if !tail.trim().is_empty() {
            return Err(SimError::ModelSyntax {
                source_name: source_name.to_string(),
                object: chunks.len(),
                message: "object is not terminated by ';'".to_string(),
            });
        }

        let mut objects = Vec::with_capacity(chunks.len());
        for (idx, chunk) in chunks.iter().enumerate() {
            if chunk.trim().is_empty() {
                continue;
            }
            let mut parts = chunk.split(',').map(str::trim);
            let class = parts.next().unwrap_or_default();
            if class.is_empty() {
                return Err(SimError::ModelSyntax {
                    source_name: source_name.to_string(),
                    object: idx,
                    message: "missing class name".to_string(),
                });
            }
            objects.push(ModelObject::new(class, parts));
        }
        Ok(Self { objects })
    }

    pub fn push(&mut self, object: ModelObject) {
        self.objects.push(object);
    }

    pub fn extend(&mut self, objects: impl IntoIterator<Item = ModelObject>) {
        self.objects.extend(objects);
    }

    pub fn objects(&self) -> &[ModelObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects_of<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a ModelObject> + 'a {
        self.objects.iter().filter(move |o| o.is(class))
    }

    pub fn objects_of_mut<'a>(
        &'a mut self,
        class: &'a str,
    ) -> impl Iterator<Item = &'a mut ModelObject> + 'a {
        self.objects.iter_mut().filter(move |o| o.is(class))
    }

    pub fn find(&self, class: &str, name: &str) -> Option<&ModelObject> {
        self.objects
            .iter()
            .find(|o| o.is(class) && o.name() == Some(name))
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for object in &self.objects {
            if object.fields.is_empty() {
                let _ = writeln!(out, "{};", object.class);
            } else {
                let _ = writeln!(out, "{},", object.class);
                let last = object.fields.len() - 1;
                for (i, field) in object.fields.iter().enumerate() {
                    let end = if i == last { ';' } else { ',' };
                    let _ = writeln!(out, "    {}{}", field, end);
                }
            }
            out.push('\n');
        }
        out
    }

    pub fn write(&self, path: &Path) -> SimResult<()> {
        std::fs::write(path, self.render())?;
        Ok(())
    }
}

/// Number formatting for model fields: at most six decimals, trailing zeros
/// removed, never `-0`.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let mut text = format!("{:.6}", value);
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    const GEOMETRY: &str = "! exported geometry\n\
        Zone,\n  Living|UNIT|2BR,  ! name\n  0, 0, 0, 0, 1, 1, 2.5, autocalculate, 85.0;\n\
        BuildingSurface:Detailed, Wall_1, Wall, EXT_WALL_1, Living|UNIT|2BR;\n";

    #[test]
    fn parses_objects_and_strips_comments() {
        let doc = ModelDocument::parse("geometry", GEOMETRY).unwrap();
        assert_eq!(doc.len(), 2);
        let zone = &doc.objects()[0];
        assert!(zone.is("ZONE"));
        assert_eq!(zone.name(), Some("Living|UNIT|2BR"));
        assert_eq!(zone.number(9), Some(85.0));
        assert_eq!(zone.number(8), None);
        let wall = doc.find("BuildingSurface:Detailed", "Wall_1").unwrap();
        assert_eq!(wall.field(2), Some("EXT_WALL_1"));
    }

    #[test]
    fn found_object_outlives_the_class_name() {
        let doc = ModelDocument::parse("geometry", GEOMETRY).unwrap();
        let wall = {
            let class = String::from("buildingsurface:detailed");
            doc.find(&class, "Wall_1")
        };
        assert_eq!(wall.and_then(|w| w.field(3)), Some("Living|UNIT|2BR"));
        assert!(doc.find("Zone", "Wall_1").is_none());
    }

    #[test]
    fn unterminated_object_is_rejected() {
        let err = ModelDocument::parse("bad", "Zone, A;\nZone, B").unwrap_err();
        assert!(matches!(err, SimError::ModelSyntax { object: 1, .. }));
    }

    #[test]
    fn render_then_parse_is_stable() {
        let doc = ModelDocument::parse("geometry", GEOMETRY).unwrap();
        let rendered = doc.render();
        let again = ModelDocument::parse("rendered", &rendered).unwrap();
        assert_eq!(again, doc);
        assert_eq!(again.render(), rendered);
    }

    #[test]
    fn numbers_have_fixed_format() {
        assert_eq!(format_number(1.0), "1");
        assert_eq!(format_number(0.1 + 0.2), "0.3");
        assert_eq!(format_number(-0.0000001), "0");
        assert_eq!(format_number(12.3456789), "12.345679");
        assert_eq!(format_number(f64::NAN), "0");
    }
}
