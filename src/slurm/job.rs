use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_json::Value;
use tinytemplate::error::Error as TemplateError;
use tinytemplate::{format_unescaped, TinyTemplate};

use crate::error::{Result, SweepError};
use crate::settings::value::flatten;
use crate::settings::{Settings, SCRIPT_TEMPLATE, SETTINGS_DIR, SLURM_TEMPLATE};
use crate::slurm::queue::job_name;

pub const SCRIPTS_DIR: &str = "scripts";
pub const SLURM_DIR: &str = "slurm";
pub const RESULTS_DIR: &str = "results";
pub const SLURM_OUT_DIR: &str = "slurm_out";
pub const SLURM_ERRORS_DIR: &str = "slurm_errors";

/// Raw text of the two templates kept in a sweep directory's `.glurmo`
///
/// Templates use TinyTemplate syntax: `{name}` substitutes a binding and `{name | atoi}` substitutes
/// it as an integer. Literal braces (for example shell `${VAR}`) must be escaped as `\{`.
pub struct Templates {
    script: String,
    script_path: PathBuf,
    slurm: String,
    slurm_path: PathBuf,
}

impl Templates {
    pub fn read(sim_dir: &Path) -> Result<Templates> {
        let dir = sim_dir.join(SETTINGS_DIR);
        let script_path = dir.join(SCRIPT_TEMPLATE);
        let slurm_path = dir.join(SLURM_TEMPLATE);
        Ok(Templates {
            script: read_template(&script_path, "script template")?,
            script_path,
            slurm: read_template(&slurm_path, "slurm template")?,
            slurm_path,
        })
    }
}

fn read_template(path: &Path, what: &'static str) -> Result<String> {
    match path.is_file() {
        true => fs::read_to_string(path).map_err(|err| SweepError::io(path, err)),
        false => Err(SweepError::NotFound { path: path.to_path_buf(), what }),
    }
}

/// Generated script for run `index`
pub fn script_path(leaf: &Path, index: usize, extension: &str) -> PathBuf {
    leaf.join(SCRIPTS_DIR).join(format!("script_{}{}", index, extension))
}

/// Generated sbatch submission script for run `index`
pub fn slurm_path(leaf: &Path, index: usize) -> PathBuf {
    leaf.join(SLURM_DIR).join(format!("slurm_{}", index))
}

/// Result path handed to the script; the script appends its own extension
pub fn results_path(leaf: &Path, index: usize) -> PathBuf {
    leaf.join(RESULTS_DIR).join(format!("results___{}", index))
}

/// Render every script and sbatch submission script of a leaf directory
///
/// Creates `scripts`, `slurm`, `slurm_out`, `slurm_errors` and `results` under `leaf`, then writes
/// `n_sims` files into each of `scripts` and `slurm`. A failing render leaves earlier files behind.
pub fn materialize(leaf: &Path, settings: &Settings) -> Result<usize> {
    let templates = Templates::read(leaf)?;
    let n_sims = settings.n_sims()?;
    let extension = settings.extension()?;
    info!("Writing {} scripts to {}", n_sims, leaf.display());

    for dir in [SCRIPTS_DIR, SLURM_DIR, SLURM_OUT_DIR, SLURM_ERRORS_DIR, RESULTS_DIR] {
        let path = leaf.join(dir);
        fs::create_dir_all(&path).map_err(|err| SweepError::io(&path, err))?;
    }

    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&format_unescaped);
    tt.add_formatter("atoi", atoi);
    tt.add_template("script", &templates.script)
        .map_err(|err| template_error(&templates.script_path, err))?;
    tt.add_template("slurm", &templates.slurm)
        .map_err(|err| template_error(&templates.slurm_path, err))?;

    let slurm_settings = flatten(settings.slurm())?;

    for index in 0..n_sims {
        let script = script_path(leaf, index, extension);
        let context = script_bindings(leaf, settings, index)?;
        let content = tt.render("script", &context)
            .map_err(|err| template_error(&templates.script_path, err))?;
        write_file(&script, &content)?;

        let context = slurm_bindings(leaf, settings, &slurm_settings, index, &script)?;
        let content = tt.render("slurm", &context)
            .map_err(|err| template_error(&templates.slurm_path, err))?;
        write_file(&slurm_path(leaf, index), &content)?;
    }

    Ok(n_sims)
}

/// Bindings for the script template: script settings plus per-run fields
fn script_bindings(leaf: &Path, settings: &Settings, index: usize) -> Result<BTreeMap<String, String>> {
    let mut context = settings.script().clone();
    context.insert("id".to_string(), settings.id()?.to_string());
    context.insert("n_sims".to_string(), settings.n_sims()?.to_string());
    context.insert("index".to_string(), index.to_string());
    context.insert("results_path".to_string(), path_string(&results_path(leaf, index)));
    Ok(context)
}

/// Bindings for the sbatch template
///
/// Later sources win: flattened slurm settings, then script settings, then per-run fields.
fn slurm_bindings(
    leaf: &Path,
    settings: &Settings,
    slurm_settings: &BTreeMap<String, String>,
    index: usize,
    script: &Path,
) -> Result<BTreeMap<String, String>> {
    let id = settings.id()?;
    let mut context = slurm_settings.clone();
    context.extend(settings.script().iter().map(|(k, v)| (k.clone(), v.clone())));
    context.insert("id".to_string(), id.to_string());
    context.insert("simulation_id".to_string(), settings.simulation_id()?.to_string());
    context.insert("index".to_string(), index.to_string());
    context.insert("job_id".to_string(), job_name(id, index));
    context.insert("output_path".to_string(), path_string(&leaf.join(SLURM_OUT_DIR).join(format!("output___{}", index))));
    context.insert("error_path".to_string(), path_string(&leaf.join(SLURM_ERRORS_DIR).join(format!("error___{}", index))));
    context.insert("path_to_script".to_string(), path_string(script));
    Ok(context)
}

/// `{value | atoi}`: render a string binding as an integer
fn atoi(value: &Value, output: &mut String) -> tinytemplate::error::Result<()> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(TemplateError::GenericError { msg: format!("atoi expects a string, found `{}`", other) }),
    };
    let number: i64 = text.parse()
        .map_err(|_| TemplateError::GenericError { msg: format!("atoi could not convert `{}` to an integer", text) })?;
    output.push_str(&number.to_string());
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    debug!("Writing {}", path.display());
    let mut file = File::create(path).map_err(|err| SweepError::io(path, err))?;
    file.write_all(content.as_bytes()).map_err(|err| SweepError::io(path, err))
}

fn template_error(path: &Path, err: TemplateError) -> SweepError {
    SweepError::Template { path: path.to_path_buf(), reason: err.to_string() }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
pub(crate) mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::settings::tests::sample_settings;

    pub(crate) const SCRIPT: &str = "run({index}, \"{results_path}{result_extension}\")\n";
    pub(crate) const SLURM: &str = "#!/bin/bash\n#SBATCH --job-name={job_id}\n#SBATCH --time={time}\n#SBATCH --output={output_path}\nRscript {path_to_script}\n";

    pub(crate) fn write_templates(dir: &Path, script: &str, slurm: &str) {
        let settings_dir = dir.join(SETTINGS_DIR);
        fs::create_dir_all(&settings_dir).unwrap();
        fs::write(settings_dir.join(SCRIPT_TEMPLATE), script).unwrap();
        fs::write(settings_dir.join(SLURM_TEMPLATE), slurm).unwrap();
    }

    #[test]
    fn writes_one_script_and_one_submission_per_run() {
        let dir = tempdir().unwrap();
        write_templates(dir.path(), SCRIPT, SLURM);

        let written = materialize(dir.path(), &sample_settings()).unwrap();

        assert_eq!(written, 4);
        for index in 0..4 {
            assert!(script_path(dir.path(), index, ".R").is_file());
            assert!(slurm_path(dir.path(), index).is_file());
        }
        assert!(!script_path(dir.path(), 4, ".R").exists());
        assert!(dir.path().join(RESULTS_DIR).is_dir());
        assert!(dir.path().join(SLURM_OUT_DIR).is_dir());
        assert!(dir.path().join(SLURM_ERRORS_DIR).is_dir());
    }

    #[test]
    fn renders_per_run_bindings() {
        let dir = tempdir().unwrap();
        write_templates(dir.path(), SCRIPT, SLURM);

        materialize(dir.path(), &sample_settings()).unwrap();

        let script = fs::read_to_string(script_path(dir.path(), 2, ".R")).unwrap();
        let expected_results = results_path(dir.path(), 2);
        assert_eq!(script, format!("run(2, \"{}.csv\")\n", expected_results.display()));

        let slurm = fs::read_to_string(slurm_path(dir.path(), 2)).unwrap();
        assert!(slurm.contains("--job-name=sim___2"));
        assert!(slurm.contains("--time=01:00:00"));
        assert!(slurm.contains(&format!("Rscript {}", script_path(dir.path(), 2, ".R").display())));
    }

    #[test]
    fn missing_binding_is_a_template_error() {
        let dir = tempdir().unwrap();
        write_templates(dir.path(), "{no_such_setting}\n", SLURM);

        let err = materialize(dir.path(), &sample_settings()).unwrap_err();

        assert!(matches!(err, SweepError::Template { .. }), "{:?}", err);
    }

    #[test]
    fn atoi_formats_integers_and_rejects_text() {
        let dir = tempdir().unwrap();
        write_templates(dir.path(), SCRIPT, "#SBATCH --array=0-{n_sims_total | atoi}\n");
        let settings = sample_settings();
        let mut script = settings.script().clone();
        script.insert("n_sims_total".to_string(), " 12 ".to_string());
        let with_count = Settings::new(settings.general().clone(), script.clone(), settings.slurm().clone());

        materialize(dir.path(), &with_count).unwrap();
        let slurm = fs::read_to_string(slurm_path(dir.path(), 0)).unwrap();
        assert_eq!(slurm, "#SBATCH --array=0-12\n");

        script.insert("n_sims_total".to_string(), "twelve".to_string());
        let broken = Settings::new(settings.general().clone(), script, settings.slurm().clone());
        assert!(matches!(materialize(dir.path(), &broken), Err(SweepError::Template { .. })));
    }

    #[test]
    fn missing_template_is_not_found() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(SETTINGS_DIR)).unwrap();
        assert!(matches!(materialize(dir.path(), &sample_settings()), Err(SweepError::NotFound { .. })));
    }

    #[test]
    fn zero_runs_writes_no_scripts() {
        let dir = tempdir().unwrap();
        write_templates(dir.path(), SCRIPT, SLURM);
        let settings = sample_settings();
        let mut general = settings.general().clone();
        general.insert("n_sims".to_string(), "0".to_string());
        let empty = Settings::new(general, settings.script().clone(), settings.slurm().clone());

        assert_eq!(materialize(dir.path(), &empty).unwrap(), 0);
        assert_eq!(fs::read_dir(dir.path().join(SCRIPTS_DIR)).unwrap().count(), 0);
    }
}
