use std::fs;
use std::path::Path;

use anyhow::Context;
use colored::Colorize;
use confstore_envelope::{Envelope, EnvelopeCodec};
use confstore_store::StoreConfig;
use confstore_types::StoreFileId;
use serde_json::json;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Inspect(args) => cmd_inspect(&args.path, format),
        Command::Validate(args) => cmd_validate(&args.path, format),
        Command::Files(args) => cmd_files(args.config.as_deref(), format),
    }
}

fn read_file(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn cmd_inspect(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let bytes = read_file(path)?;
    let envelope = EnvelopeCodec::decode(&bytes)
        .with_context(|| format!("{} is not a valid store file", path.display()))?;
    println!("{}", render_inspect(path, &envelope, format)?);
    Ok(())
}

fn render_inspect(path: &Path, envelope: &Envelope, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let sections: Vec<_> = envelope
                .sections
                .iter()
                .map(|s| json!({ "name": s.name, "bytes": s.payload.len() }))
                .collect();
            let doc = json!({
                "path": path.display().to_string(),
                "version": envelope.version.get(),
                "sections": sections,
            });
            Ok(serde_json::to_string_pretty(&doc)?)
        }
        OutputFormat::Text => {
            let mut out = format!(
                "{}\n  Version: {}\n  Sections: {}",
                path.display().to_string().bold(),
                envelope.version.get().to_string().cyan(),
                envelope.sections.len()
            );
            let width = envelope.sections.iter().map(|s| s.name.len()).max().unwrap_or(0);
            for section in &envelope.sections {
                out.push_str(&format!(
                    "\n    {:<width$}  {} bytes",
                    section.name.yellow(),
                    section.payload.len()
                ));
            }
            Ok(out)
        }
    }
}

fn cmd_validate(path: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let bytes = read_file(path)?;
    let result = EnvelopeCodec::decode(&bytes);
    println!("{}", render_validate(path, &result, format)?);
    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(anyhow::Error::new(e).context(format!("{} failed validation", path.display()))),
    }
}

fn render_validate(
    path: &Path,
    result: &Result<Envelope, confstore_envelope::EnvelopeError>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let shown = path.display().to_string();
    Ok(match (format, result) {
        (OutputFormat::Json, Ok(envelope)) => serde_json::to_string_pretty(&json!({
            "path": shown,
            "valid": true,
            "version": envelope.version.get(),
            "sections": envelope.sections.len(),
        }))?,
        (OutputFormat::Json, Err(e)) => serde_json::to_string_pretty(&json!({
            "path": shown,
            "valid": false,
            "error": e.to_string(),
        }))?,
        (OutputFormat::Text, Ok(envelope)) => format!(
            "{} {}: valid (version {}, {} sections)",
            "✓".green().bold(),
            shown,
            envelope.version.get(),
            envelope.sections.len()
        ),
        (OutputFormat::Text, Err(e)) => format!("{} {}: {}", "✗".red().bold(), shown, e),
    })
}

fn cmd_files(config: Option<&Path>, format: OutputFormat) -> anyhow::Result<()> {
    let config = match config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    println!("{}", render_files(&config, format)?);
    Ok(())
}

fn render_files(config: &StoreConfig, format: OutputFormat) -> anyhow::Result<String> {
    let sta = config.sta_id;
    let role = |id: StoreFileId| {
        if id == sta.shared_file() {
            "shared"
        } else if sta.user_files().contains(&id) {
            "user"
        } else {
            "unused"
        }
    };
    match format {
        OutputFormat::Json => {
            let files: Vec<_> = config
                .file_table
                .iter()
                .map(|(id, name)| json!({ "id": id, "file": name, "role": role(id) }))
                .collect();
            let doc = json!({
                "station": sta,
                "directory": config.store_directory_name,
                "encrypt_credentials": config.encrypt_credentials,
                "buffered_write_interval_ms": config.buffered_write_interval.as_millis() as u64,
                "files": files,
            });
            Ok(serde_json::to_string_pretty(&doc)?)
        }
        OutputFormat::Text => {
            let mut out = format!(
                "Station: {}\nDirectory: {}\nCredentials encrypted: {}",
                sta.to_string().yellow(),
                config.store_directory_name,
                config.encrypt_credentials
            );
            for (id, name) in config.file_table.iter() {
                let role = match role(id) {
                    "unused" => "unused".dimmed(),
                    other => other.green(),
                };
                out.push_str(&format!("\n  {:<26} {:<36} {}", id.to_string(), name, role));
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use confstore_types::{StaId, StoreFileTable};

    use super::*;

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn inspect_text_lists_sections() {
        plain();
        let envelope = Envelope::new()
            .with_section("Networks", "<n />")
            .with_section("Settings", "");
        let out = render_inspect(Path::new("ConfigStore.xml"), &envelope, OutputFormat::Text).unwrap();
        assert!(out.contains("Version: 3"));
        assert!(out.contains("Sections: 2"));
        assert!(out.contains("Networks  5 bytes"));
        assert!(out.contains("Settings  0 bytes"));
    }

    #[test]
    fn inspect_json() {
        let envelope = Envelope::new().with_section("A", "x");
        let out = render_inspect(Path::new("a.xml"), &envelope, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["version"], 3);
        assert_eq!(value["sections"][0]["name"], "A");
        assert_eq!(value["sections"][0]["bytes"], 1);
    }

    #[test]
    fn validate_reports_errors() {
        plain();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.xml");
        fs::write(&path, "<ConfigStoreData>\n<int name=\"Version\" value=\"9\" />\n</ConfigStoreData>\n")
            .unwrap();
        assert!(cmd_validate(&path, OutputFormat::Text).is_err());

        let result = EnvelopeCodec::decode(&fs::read(&path).unwrap());
        let out = render_validate(&path, &result, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["valid"], false);
        assert!(value["error"].as_str().unwrap().contains('9'));
    }

    #[test]
    fn validate_accepts_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("good.xml");
        let bytes = EnvelopeCodec::encode(&Envelope::new().with_section("A", "x")).unwrap();
        fs::write(&path, bytes).unwrap();
        assert!(cmd_validate(&path, OutputFormat::Json).is_ok());
        assert!(cmd_inspect(&path, OutputFormat::Text).is_ok());
    }

    #[test]
    fn files_marks_roles() {
        plain();
        let config = StoreConfig::default();
        let out = render_files(&config, OutputFormat::Text).unwrap();
        assert!(out.contains("Station: primary"));
        let shared = out.lines().find(|l| l.contains("shared-general")).unwrap();
        assert!(shared.contains("ConfigStore.xml") && shared.ends_with("shared"));
        let secondary = out.lines().find(|l| l.contains("user-secondary")).unwrap();
        assert!(secondary.ends_with("unused"));
    }

    #[test]
    fn files_json_for_secondary() {
        let config = StoreConfig {
            sta_id: StaId::Secondary,
            file_table: StoreFileTable::empty()
                .with_entry(StoreFileId::SharedSecondary, "s.xml")
                .with_entry(StoreFileId::UserSecondary, "u.xml"),
            ..Default::default()
        };
        let out = render_files(&config, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["station"], "secondary");
        assert_eq!(value["files"][0]["id"], "shared-secondary");
        assert_eq!(value["files"][0]["role"], "shared");
        assert_eq!(value["files"][1]["role"], "user");
    }

    #[test]
    fn files_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.toml");
        fs::write(&path, "sta_id = \"secondary\"\n").unwrap();
        assert!(cmd_files(Some(&path), OutputFormat::Text).is_ok());
        assert!(cmd_files(Some(&dir.path().join("none.toml")), OutputFormat::Text).is_err());
    }
}
