//! Filesystem repository for model argument sets.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use crate::common::config::AppCfg;
use crate::common::error::{RetroError, RetroResult};
use crate::data::repo_fs::check_file_stem;

use super::domain::{ArgsRepo, ModelArgs};

/// Persist `ModelArgs` as pretty JSON under `<data_root>/model_args/<name>.json`.
pub struct FsArgsRepo {
    root: PathBuf,
}

impl FsArgsRepo {
    pub fn new(cfg: &AppCfg) -> Self {
        Self {
            root: PathBuf::from(&cfg.data_root).join("model_args"),
        }
    }

    fn path(&self, name: &str) -> RetroResult<PathBuf> {
        let name = check_file_stem(name)?;
        Ok(self.root.join(format!("{name}.json")))
    }
}

impl ArgsRepo for FsArgsRepo {
    fn put_args(&self, name: &str, args: &ModelArgs) -> RetroResult<()> {
        let path = self.path(name)?;
        fs::create_dir_all(&self.root).map_err(|err| RetroError::io(&self.root, err))?;
        let file = File::create(&path).map_err(|err| RetroError::io(&path, err))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, args)
            .map_err(|err| RetroError::Internal(err.to_string()))?;
        writer.flush().map_err(|err| RetroError::io(&path, err))?;
        tracing::debug!(path = %path.display(), "model args stored");
        Ok(())
    }

    fn get_args(&self, name: &str) -> RetroResult<ModelArgs> {
        let path = self.path(name)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(RetroError::data_missing(format!("model args {name}")))
            }
            Err(err) => return Err(RetroError::io(&path, err)),
        };
        serde_json::from_reader(BufReader::new(file))
            .map_err(|err| RetroError::invalid(format!("{}: {err}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::domain::{Algorithm, TargetType, TrainMethod};
    use crate::training::params::model_parameters_for;

    fn repo(dir: &tempfile::TempDir) -> FsArgsRepo {
        let cfg = AppCfg {
            data_root: dir.path().display().to_string(),
            ..AppCfg::default()
        };
        FsArgsRepo::new(&cfg)
    }

    #[test]
    fn stores_and_reloads_args() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(&dir);
        let args = model_parameters_for(
            &[Algorithm::LightGBM, Algorithm::Ftrl],
            TargetType::Classification,
            TrainMethod::GridTune,
        );
        repo.put_args("leads", &args).unwrap();
        assert!(dir.path().join("model_args/leads.json").exists());
        assert_eq!(repo.get_args("leads").unwrap(), args);
    }

    #[test]
    fn unknown_and_unsafe_names() {
        let dir = tempfile::tempdir().unwrap();
        let repo = repo(&dir);
        assert!(matches!(repo.get_args("nope"), Err(RetroError::DataMissing(_))));
        assert!(matches!(
            repo.put_args("../escape", &ModelArgs::default()),
            Err(RetroError::InvalidInput(_))
        ));
    }
}
