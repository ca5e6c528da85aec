//! Project-level defaults read from `.csproj` files.

use docscope_core::model::{CodeType, NullabilityContext};
use quick_xml::events::Event;
use quick_xml::Reader;

/// `<Nullable>` of a project file. Later property groups override earlier
/// ones, as MSBuild evaluates them.
pub fn csproj_nullability(xml: &str) -> NullabilityContext {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut in_nullable = false;
    let mut context = NullabilityContext::Unspecified;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => in_nullable = e.name().as_ref() == b"Nullable",
            Ok(Event::Text(text)) if in_nullable => {
                let value = text.unescape().unwrap_or_default();
                context = match value.trim().to_ascii_lowercase().as_str() {
                    "enable" | "warnings" | "annotations" => NullabilityContext::Enabled,
                    "disable" => NullabilityContext::Disabled,
                    _ => context,
                };
            }
            Ok(Event::End(_)) => in_nullable = false,
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::debug!(error = %e, "unreadable project file, nullability left unspecified");
                break;
            }
            _ => {}
        }
    }
    context
}

/// Nullability defaults by project directory.
#[derive(Debug, Clone, Default)]
pub struct ProjectDefaults {
    /// (directory prefix with trailing `/`, or empty for the root; context)
    projects: Vec<(String, NullabilityContext)>,
}

impl ProjectDefaults {
    /// `projects` holds (repository-relative csproj path, file content).
    pub fn from_projects<'a>(projects: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut out: Vec<(String, NullabilityContext)> = projects
            .into_iter()
            .map(|(path, xml)| {
                let dir = path.rsplit_once('/').map_or(String::new(), |(d, _)| format!("{d}/"));
                (dir, csproj_nullability(xml))
            })
            .filter(|(_, ctx)| *ctx != NullabilityContext::Unspecified)
            .collect();
        // Deepest directory first.
        out.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Self { projects: out }
    }

    /// Context of the nearest enclosing project.
    pub fn for_file(&self, relative: &str) -> NullabilityContext {
        self.projects
            .iter()
            .find(|(dir, _)| relative.starts_with(dir.as_str()))
            .map_or(NullabilityContext::Unspecified, |(_, ctx)| *ctx)
    }

    /// Fill in a project default for a type the source left unspecified.
    /// Under an enabled context unannotated reference types are non-null.
    pub fn apply(&self, ty: &mut CodeType) {
        if ty.nullability != NullabilityContext::Unspecified {
            return;
        }
        let context = self.for_file(&ty.provenance.file_path);
        if context == NullabilityContext::Enabled {
            for field in &mut ty.fields {
                let annotated = field.field_type.ends_with('?') || field.field_type.starts_with("Nullable<");
                field.nullable = annotated;
            }
        }
        ty.nullability = context;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSPROJ: &str = r#"<Project Sdk="Microsoft.NET.Sdk">
  <PropertyGroup>
    <TargetFramework>net8.0</TargetFramework>
    <Nullable>enable</Nullable>
  </PropertyGroup>
</Project>"#;

    #[test]
    fn reads_nullable_property() {
        assert_eq!(csproj_nullability(CSPROJ), NullabilityContext::Enabled);
        assert_eq!(
            csproj_nullability("<Project><PropertyGroup><Nullable>disable</Nullable></PropertyGroup></Project>"),
            NullabilityContext::Disabled
        );
        assert_eq!(csproj_nullability("<Project />"), NullabilityContext::Unspecified);
    }

    #[test]
    fn nearest_project_wins() {
        let defaults = ProjectDefaults::from_projects([
            ("Shop.csproj", CSPROJ),
            (
                "legacy/Legacy.csproj",
                "<Project><PropertyGroup><Nullable>disable</Nullable></PropertyGroup></Project>",
            ),
        ]);
        assert_eq!(defaults.for_file("src/Order.cs"), NullabilityContext::Enabled);
        assert_eq!(defaults.for_file("legacy/Old.cs"), NullabilityContext::Disabled);
    }
}
