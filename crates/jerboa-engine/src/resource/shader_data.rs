use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Programmable pipeline stage.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Geometry,
}

impl ShaderStage {
    fn from_directive(name: &str) -> Option<Self> {
        match name {
            "vertex" => Some(ShaderStage::Vertex),
            "fragment" | "pixel" => Some(ShaderStage::Fragment),
            "geometry" => Some(ShaderStage::Geometry),
            _ => None,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Geometry => "geometry",
        })
    }
}

/// Line prefix that opens a stage section in a combined shader file.
const STAGE_DIRECTIVE: &str = "#type";

/// GLSL sources for one shader program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderDataGlsl {
    pub vertex: String,
    pub fragment: String,
    pub geometry: Option<String>,
    /// Files the sources were read from, for diagnostics.
    pub paths: Vec<PathBuf>,
}

impl ShaderDataGlsl {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
            geometry: None,
            paths: Vec::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: impl Into<String>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }

    /// Reads one file per stage.
    pub fn from_files(
        vertex: impl AsRef<Path>,
        fragment: impl AsRef<Path>,
        geometry: Option<&Path>,
    ) -> Result<Self> {
        let (vertex, fragment) = (vertex.as_ref(), fragment.as_ref());
        let mut data = Self::new(read_source(vertex)?, read_source(fragment)?);
        data.paths = vec![vertex.to_path_buf(), fragment.to_path_buf()];
        if let Some(geometry) = geometry {
            data.geometry = Some(read_source(geometry)?);
            data.paths.push(geometry.to_path_buf());
        }
        Ok(data)
    }

    /// Reads a combined file whose stages are introduced by `#type <stage>`
    /// lines.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = read_source(path)?;
        let mut data = Self::parse_combined(&text)
            .with_context(|| format!("invalid combined shader {}", path.display()))?;
        data.paths = vec![path.to_path_buf()];
        Ok(data)
    }

    /// Splits combined source text into stages.
    ///
    /// Vertex and fragment sections are required, geometry is optional.
    /// Unknown or repeated stages are errors, as is non-blank text before the
    /// first directive.
    pub fn parse_combined(text: &str) -> Result<Self> {
        let mut vertex = None;
        let mut fragment = None;
        let mut geometry = None;

        let mut current: Option<(ShaderStage, String)> = None;

        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim_start();
            if let Some(name) = stage_directive(trimmed) {
                let stage = ShaderStage::from_directive(name).with_context(|| {
                    format!("line {}: unknown shader stage {name:?}", line_no + 1)
                })?;
                if let Some((done, source)) = current.take() {
                    store(&mut vertex, &mut fragment, &mut geometry, done, source)?;
                }
                current = Some((stage, String::new()));
                continue;
            }

            match current.as_mut() {
                Some((_, source)) => {
                    source.push_str(line);
                    source.push('\n');
                }
                None if trimmed.is_empty() => {}
                None => anyhow::bail!(
                    "line {}: source before the first {STAGE_DIRECTIVE} directive",
                    line_no + 1
                ),
            }
        }

        if let Some((done, source)) = current.take() {
            store(&mut vertex, &mut fragment, &mut geometry, done, source)?;
        }

        Ok(Self {
            vertex: vertex.context("missing vertex stage")?,
            fragment: fragment.context("missing fragment stage")?,
            geometry,
            paths: Vec::new(),
        })
    }

    pub fn source(&self, stage: ShaderStage) -> Option<&str> {
        match stage {
            ShaderStage::Vertex => Some(&self.vertex),
            ShaderStage::Fragment => Some(&self.fragment),
            ShaderStage::Geometry => self.geometry.as_deref(),
        }
    }

    /// Short description for log lines.
    pub fn describe(&self) -> String {
        if self.paths.is_empty() {
            "<inline shader>".to_string()
        } else {
            self.paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

/// The stage name after a `#type` token, or `None` when the line is not a
/// directive. The token must stand alone, so `#typedef` is source text.
fn stage_directive(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(STAGE_DIRECTIVE)?;
    (rest.is_empty() || rest.starts_with(char::is_whitespace)).then(|| rest.trim())
}

fn store(
    vertex: &mut Option<String>,
    fragment: &mut Option<String>,
    geometry: &mut Option<String>,
    stage: ShaderStage,
    source: String,
) -> Result<()> {
    let slot = match stage {
        ShaderStage::Vertex => vertex,
        ShaderStage::Fragment => fragment,
        ShaderStage::Geometry => geometry,
    };
    anyhow::ensure!(slot.is_none(), "duplicate {stage} stage");
    *slot = Some(source);
    Ok(())
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read shader source {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMBINED: &str = "\
#type vertex
#version 450
void main() {}

#type fragment
#version 450
void main() {}
";

    #[test]
    fn parse_combined_splits_stages() {
        let data = ShaderDataGlsl::parse_combined(COMBINED).unwrap();
        assert!(data.vertex.starts_with("#version 450\nvoid main() {}"));
        assert!(data.fragment.starts_with("#version 450"));
        assert!(data.geometry.is_none());
    }

    #[test]
    fn parse_combined_accepts_geometry_and_pixel_alias() {
        let text = "#type vertex\na\n#type geometry\nb\n#type pixel\nc\n";
        let data = ShaderDataGlsl::parse_combined(text).unwrap();
        assert_eq!(data.vertex, "a\n");
        assert_eq!(data.source(ShaderStage::Geometry), Some("b\n"));
        assert_eq!(data.fragment, "c\n");
    }

    #[test]
    fn parse_combined_requires_fragment() {
        let err = ShaderDataGlsl::parse_combined("#type vertex\nvoid main() {}\n").unwrap_err();
        assert!(err.to_string().contains("missing fragment stage"));
    }

    #[test]
    fn parse_combined_rejects_duplicate_stage() {
        let text = "#type vertex\na\n#type vertex\nb\n#type fragment\nc\n";
        let err = ShaderDataGlsl::parse_combined(text).unwrap_err();
        assert!(err.to_string().contains("duplicate vertex stage"));
    }

    #[test]
    fn directive_token_must_stand_alone() {
        let text = "#type vertex\na\n#typedef b\n#type\tfragment\nc\n";
        let data = ShaderDataGlsl::parse_combined(text).unwrap();
        assert_eq!(data.vertex, "a\n#typedef b\n");
        assert_eq!(data.fragment, "c\n");

        let err = ShaderDataGlsl::parse_combined("#typevertex\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn parse_combined_rejects_unknown_stage() {
        let err = ShaderDataGlsl::parse_combined("#type compute\n").unwrap_err();
        assert!(err.to_string().contains("unknown shader stage"));
    }

    #[test]
    fn parse_combined_rejects_preamble() {
        let err = ShaderDataGlsl::parse_combined("#version 450\n#type vertex\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn leading_blank_lines_are_allowed() {
        let text = format!("\n   \n{COMBINED}");
        assert!(ShaderDataGlsl::parse_combined(&text).is_ok());
    }

    #[test]
    fn describe_inline_shader() {
        assert_eq!(ShaderDataGlsl::new("v", "f").describe(), "<inline shader>");
    }
}
