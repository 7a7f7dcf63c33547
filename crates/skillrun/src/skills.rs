//! Skill discovery
//!
//! A skill is a directory holding a `SKILL.md` file: optional YAML front
//! matter (`name`, `description`) followed by the prompt body.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SKILL_FILE: &str = "SKILL.md";

/// Relative prefixes in a skill body that point into the skill directory
const RESOURCE_PREFIXES: &[&str] = &["scripts/", "templates/", "assets/"];

/// A loaded skill
#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    pub name: String,
    pub description: String,
    /// Skill directory
    pub path: PathBuf,
    /// Prompt body (everything after the front matter)
    pub content: String,
}

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl Skill {
    /// Load `SKILL.md` from a skill directory
    pub fn load(dir: &Path) -> Result<Self> {
        let file = dir.join(SKILL_FILE);
        let raw = fs::read_to_string(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        Self::parse(dir, &raw).with_context(|| format!("Invalid {}", file.display()))
    }

    /// Parse `SKILL.md` contents; the name falls back to the directory name
    pub fn parse(dir: &Path, raw: &str) -> Result<Self> {
        let (front, body) = split_front_matter(raw);
        let meta: FrontMatter = match front {
            Some(yaml) if !yaml.trim().is_empty() => {
                serde_yaml::from_str(yaml).context("Failed to parse front matter")?
            }
            _ => FrontMatter::default(),
        };

        let name = meta
            .name
            .filter(|n| !n.trim().is_empty())
            .map(|n| n.trim().to_string())
            .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
            .unwrap_or_default();

        Ok(Self {
            name,
            description: meta.description.unwrap_or_default().trim().to_string(),
            path: dir.to_path_buf(),
            content: body.trim().to_string(),
        })
    }

    /// Body with resource prefixes rewritten to absolute paths.
    ///
    /// A prefix is only rewritten when the matching subdirectory exists.
    pub fn resolved_content(&self) -> String {
        let mut content = self.content.clone();
        for prefix in RESOURCE_PREFIXES {
            let resolved = self.path.join(prefix);
            if resolved.is_dir() {
                let mut replacement = resolved.to_string_lossy().into_owned();
                if !replacement.ends_with(std::path::MAIN_SEPARATOR) {
                    replacement.push(std::path::MAIN_SEPARATOR);
                }
                content = content.replace(prefix, &replacement);
            }
        }
        content
    }
}

/// Split `---` delimited front matter from the body
fn split_front_matter(raw: &str) -> (Option<&str>, &str) {
    let text = raw.trim_start_matches('\u{feff}');
    let Some(rest) = text.strip_prefix("---") else {
        return (None, text);
    };
    let Some(rest) = rest.strip_prefix('\n').or_else(|| rest.strip_prefix("\r\n")) else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return (Some(yaml), body);
        }
        offset += line.len();
    }

    // Unterminated front matter: treat the whole file as body
    (None, text)
}

/// Skills found under a set of directories, keyed by name
#[derive(Debug, Default)]
pub struct SkillCatalog {
    skills: BTreeMap<String, Skill>,
    scanned: Vec<PathBuf>,
}

impl SkillCatalog {
    /// Scan the immediate subdirectories of each directory for `SKILL.md`.
    ///
    /// Earlier directories win when two skills share a name. Unreadable
    /// skills are logged and skipped.
    pub fn scan(dirs: &[PathBuf]) -> Self {
        let mut catalog = Self::default();
        let mut seen = HashSet::new();

        for dir in dirs {
            catalog.scanned.push(dir.clone());
            let Ok(entries) = fs::read_dir(dir) else {
                debug!(dir = %dir.display(), "Skill directory not readable");
                continue;
            };

            let mut children: Vec<_> = entries.flatten().map(|e| e.path()).collect();
            children.sort();

            for path in children {
                if !path.is_dir() || !path.join(SKILL_FILE).is_file() {
                    continue;
                }
                if let Ok(real) = path.canonicalize() {
                    if !seen.insert(real) {
                        continue;
                    }
                }

                match Skill::load(&path) {
                    Ok(skill) => {
                        if catalog.skills.contains_key(&skill.name) {
                            warn!(
                                skill = %skill.name,
                                path = %path.display(),
                                "Duplicate skill name, keeping the first"
                            );
                            continue;
                        }
                        debug!(skill = %skill.name, path = %path.display(), "Found skill");
                        catalog.skills.insert(skill.name.clone(), skill);
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping skill"),
                }
            }
        }

        catalog
    }

    pub fn get(&self, name: &str) -> Option<&Skill> {
        self.skills.get(name)
    }

    /// Skills sorted by name
    pub fn list(&self) -> Vec<&Skill> {
        self.skills.values().collect()
    }

    /// Owned copy of every skill, sorted by name
    pub fn to_vec(&self) -> Vec<Skill> {
        self.skills.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// Directories that were scanned, in order
    pub fn scanned_paths(&self) -> &[PathBuf] {
        &self.scanned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_skill(root: &Path, dir: &str, contents: &str) -> PathBuf {
        let path = root.join(dir);
        fs::create_dir_all(&path).unwrap();
        fs::write(path.join(SKILL_FILE), contents).unwrap();
        path
    }

    #[test]
    fn test_parse_front_matter() {
        let raw = "---\nname: commit\ndescription: Write commit messages\n---\n\nLook at the diff.\n";
        let skill = Skill::parse(Path::new("/skills/commit-dir"), raw).unwrap();
        assert_eq!(skill.name, "commit");
        assert_eq!(skill.description, "Write commit messages");
        assert_eq!(skill.content, "Look at the diff.");
    }

    #[test]
    fn test_name_falls_back_to_directory() {
        let skill = Skill::parse(Path::new("/skills/review"), "Just a body").unwrap();
        assert_eq!(skill.name, "review");
        assert_eq!(skill.description, "");
        assert_eq!(skill.content, "Just a body");
    }

    #[test]
    fn test_unterminated_front_matter_is_body() {
        let raw = "---\nname: x\nno closing";
        let skill = Skill::parse(Path::new("/skills/x"), raw).unwrap();
        assert_eq!(skill.name, "x");
        assert!(skill.content.starts_with("---"));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        let raw = "---\nname: [unclosed\n---\nbody";
        assert!(Skill::parse(Path::new("/skills/bad"), raw).is_err());
    }

    #[test]
    fn test_resolved_content_rewrites_existing_prefixes() {
        let root = TempDir::new().unwrap();
        let dir = write_skill(root.path(), "deploy", "Run scripts/deploy.sh then read assets/notes.md");
        fs::create_dir(dir.join("scripts")).unwrap();

        let skill = Skill::load(&dir).unwrap();
        let resolved = skill.resolved_content();
        let expected = format!("{}", dir.join("scripts").join("deploy.sh").display());
        assert!(resolved.contains(&expected), "{}", resolved);
        // assets/ does not exist, so it stays relative
        assert!(resolved.contains(" assets/notes.md"));
    }

    #[test]
    fn test_scan_catalog() {
        let root = TempDir::new().unwrap();
        write_skill(root.path(), "a", "---\nname: alpha\ndescription: First\n---\nbody a");
        write_skill(root.path(), "b", "---\ndescription: Second\n---\nbody b");
        fs::create_dir(root.path().join("not-a-skill")).unwrap();

        let catalog = SkillCatalog::scan(&[root.path().to_path_buf()]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("alpha").unwrap().description, "First");
        assert_eq!(catalog.get("b").unwrap().content, "body b");

        let names: Vec<_> = catalog.list().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "b"]);
    }

    #[test]
    fn test_scan_first_directory_wins() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_skill(first.path(), "s", "---\nname: same\ndescription: one\n---\nx");
        write_skill(second.path(), "s", "---\nname: same\ndescription: two\n---\ny");

        let catalog =
            SkillCatalog::scan(&[first.path().to_path_buf(), second.path().to_path_buf()]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get("same").unwrap().description, "one");
    }

    #[test]
    fn test_scan_missing_directory() {
        let catalog = SkillCatalog::scan(&[PathBuf::from("/nonexistent/skills")]);
        assert!(catalog.is_empty());
        assert_eq!(catalog.scanned_paths().len(), 1);
    }
}
