//! File-backed preset storage

use crate::preset::{split_row, Preset, HEADER, LAST_RUN};
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Preset file on disk
#[derive(Debug, Clone)]
pub struct PresetStore {
    path: PathBuf,
}

impl PresetStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store using the default file name inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(crate::DEFAULT_FILE_NAME))
    }

    /// Path of the preset file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load presets, falling back to the built-in set
    ///
    /// A missing file is created with the built-in presets. Read failures
    /// are logged and never reach the caller.
    pub fn load(&self) -> Vec<Preset> {
        match self.read() {
            Ok(presets) => presets,
            Err(e) => {
                warn!(
                    "Could not read presets from {}: {}; using built-in presets",
                    self.path.display(),
                    e
                );
                if !self.path.exists() {
                    if let Err(e) = self.write_lines(&default_lines()) {
                        warn!("Could not create {}: {}", self.path.display(), e);
                    } else {
                        info!("Created preset file {}", self.path.display());
                    }
                }
                Preset::builtin()
            }
        }
    }

    /// Read presets, skipping the header, short rows and malformed rows
    pub fn read(&self) -> Result<Vec<Preset>> {
        let text = fs::read_to_string(&self.path)?;
        let mut presets = Vec::new();
        for (i, line) in text.lines().enumerate() {
            match Preset::from_row(line, i + 1) {
                Ok(Some(preset)) => presets.push(preset),
                Ok(None) => {}
                Err(e) => warn!("Skipping preset: {}", e),
            }
        }
        debug!("Read {} presets from {}", presets.len(), self.path.display());
        Ok(presets)
    }

    /// Find a preset by name
    pub fn get(&self, name: &str) -> Option<Preset> {
        self.load().into_iter().find(|p| p.name == name)
    }

    /// Append a preset
    ///
    /// The `lastrun` preset replaces its earlier row instead. A missing
    /// file is seeded with the built-in presets first.
    pub fn save(&self, preset: &Preset) -> Result<()> {
        preset.validate()?;

        let mut lines = if self.path.exists() {
            fs::read_to_string(&self.path)?
                .lines()
                .map(str::to_string)
                .collect()
        } else {
            default_lines()
        };

        let row = preset.to_row();
        let mut written = false;
        if preset.name == LAST_RUN {
            for line in lines.iter_mut().filter(|l| row_name(l) == LAST_RUN) {
                line.clone_from(&row);
                written = true;
            }
        }
        if !written {
            lines.push(row);
        }

        self.write_lines(&lines)?;
        debug!("Saved preset {} to {}", preset.name, self.path.display());
        Ok(())
    }

    /// Record the settings of the latest generation
    pub fn save_last_run(&self, preset: &Preset) -> Result<()> {
        let last = Preset {
            name: LAST_RUN.into(),
            ..preset.clone()
        };
        self.save(&last)
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut data = lines.join("\n");
        data.push('\n');

        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn row_name(line: &str) -> String {
    split_row(line).into_iter().next().unwrap_or_default()
}

fn default_lines() -> Vec<String> {
    std::iter::once(HEADER.to_string())
        .chain(Preset::builtin().iter().map(Preset::to_row))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use regional_core::DivideMode;
    use tempfile::TempDir;

    fn custom(name: &str, ratios: &str) -> Preset {
        Preset {
            name: name.into(),
            mode: DivideMode::Matrix,
            ratios: ratios.into(),
            base_ratios: "0.3".into(),
            use_base: true,
            use_common: false,
            use_common_negative: true,
        }
    }

    #[test]
    fn test_missing_file_falls_back_and_is_created() {
        let dir = TempDir::new().unwrap();
        let store = PresetStore::new(dir.path().join("presets.csv"));

        let presets = store.load();
        assert_eq!(presets, Preset::builtin());
        assert!(store.path().exists());

        // second load reads the file written by the first
        assert_eq!(store.read().unwrap(), Preset::builtin());
    }

    #[test]
    fn test_default_file_name() {
        let dir = TempDir::new().unwrap();
        let store = PresetStore::in_dir(dir.path());
        assert!(store.path().ends_with("regional_prompter_presets.csv"));
        store.save(&custom("grid", "1;1")).unwrap();
        assert_eq!(store.get("grid"), Some(custom("grid", "1;1")));
    }

    #[test]
    fn test_unreadable_path_falls_back() {
        let dir = TempDir::new().unwrap();
        // a directory cannot be read as a file
        let store = PresetStore::new(dir.path());
        assert_eq!(store.load(), Preset::builtin());
    }

    #[test]
    fn test_save_appends() {
        let dir = TempDir::new().unwrap();
        let store = PresetStore::new(dir.path().join("presets.csv"));

        store.save(&custom("grid", "1,1;2,1,1")).unwrap();
        store.save(&custom("grid", "1;1")).unwrap();

        let presets = store.load();
        assert_eq!(presets.len(), 5);
        assert_eq!(presets[3], custom("grid", "1,1;2,1,1"));
        assert_eq!(store.get("grid"), Some(custom("grid", "1,1;2,1,1")));
    }

    #[test]
    fn test_lastrun_replaced() {
        let dir = TempDir::new().unwrap();
        let store = PresetStore::new(dir.path().join("presets.csv"));

        store.save_last_run(&custom("ignored", "1,1")).unwrap();
        store.save(&custom("other", "2,1")).unwrap();
        store.save_last_run(&custom("ignored", "3,1")).unwrap();

        let presets = store.load();
        let last: Vec<_> = presets.iter().filter(|p| p.name == LAST_RUN).collect();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].ratios, "3,1");
        assert_eq!(presets.len(), 5);
    }

    #[test]
    fn test_short_and_bad_rows_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("presets.csv");
        fs::write(
            &path,
            format!(
                "{}\nshort,Vertical\nbad,Sideways,\"1\",\"\",False,False,False\n{}\n",
                HEADER,
                custom("ok", "1,2").to_row()
            ),
        )
        .unwrap();

        let presets = PresetStore::new(&path).load();
        assert_eq!(presets, vec![custom("ok", "1,2")]);
    }

    #[test]
    fn test_invalid_name_rejected() {
        let dir = TempDir::new().unwrap();
        let store = PresetStore::new(dir.path().join("presets.csv"));
        assert!(store.save(&custom("a,b", "1")).is_err());
        assert!(!store.path().exists());
    }
}
