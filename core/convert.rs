use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::clash::{build_clash_config, render_yaml, ClashConfig};
use crate::dispatch::{parse_proxy_list, BatchReport};
use crate::template::{RoutingTemplate, TemplateError};

/// Failures that abort the whole conversion before any output is written.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Input file not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("Failed to read input file: {0}")]
    Read(#[source] io::Error),
    #[error("Input file is empty")]
    EmptyInput,
    #[error("No valid proxy URLs found in the input file (0/{} processed)", .0.total())]
    NoValidProxies(BatchReport),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("Failed to generate Clash config: {0}")]
    Render(#[from] serde_yaml::Error),
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Conversion {
    pub config: ClashConfig,
    pub yaml: String,
    pub batch: BatchReport,
}

#[derive(Debug, Clone)]
pub struct ConversionReport {
    /// True only when every input line produced a proxy.
    pub success: bool,
    pub message: String,
    pub output: PathBuf,
    pub batch: BatchReport,
}

impl ConversionReport {
    pub fn succeeded(&self) -> usize {
        self.batch.succeeded()
    }

    pub fn total(&self) -> usize {
        self.batch.total()
    }
}

pub fn convert_text(text: &str, template: &RoutingTemplate) -> Result<Conversion, ConvertError> {
    if text.lines().all(|line| line.trim().is_empty()) {
        return Err(ConvertError::EmptyInput);
    }

    let batch = parse_proxy_list(text);
    if batch.succeeded() == 0 {
        return Err(ConvertError::NoValidProxies(batch));
    }

    let config = build_clash_config(batch.records().cloned().collect(), template);
    let yaml = render_yaml(&config)?;
    Ok(Conversion {
        config,
        yaml,
        batch,
    })
}

/// Reads `input`, converts it, and writes the YAML document to `output`.
///
/// A partially successful batch still writes the valid subset; the returned
/// report then has `success == false`.
pub fn convert_file(
    input: &Path,
    output: &Path,
    template: &RoutingTemplate,
) -> Result<ConversionReport, ConvertError> {
    if !input.exists() {
        return Err(ConvertError::InputNotFound(input.to_path_buf()));
    }
    let text = fs::read_to_string(input).map_err(ConvertError::Read)?;
    let conversion = convert_text(&text, template)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ConvertError::Write {
            path: output.to_path_buf(),
            source,
        })?;
    }
    fs::write(output, &conversion.yaml).map_err(|source| ConvertError::Write {
        path: output.to_path_buf(),
        source,
    })?;

    let batch = conversion.batch;
    let (succeeded, total) = (batch.succeeded(), batch.total());
    log::info!("wrote {} proxies to {}", succeeded, output.display());
    Ok(ConversionReport {
        success: succeeded == total,
        message: format!(
            "Generated Clash config: {} ({}/{} proxies, {} failed)",
            output.display(),
            succeeded,
            total,
            total - succeeded
        ),
        output: output.to_path_buf(),
        batch,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::default_template;

    #[test]
    fn blank_text_is_empty_input() {
        let err = convert_text("\n   \n\t\n", default_template().unwrap()).unwrap_err();
        assert!(matches!(err, ConvertError::EmptyInput));
        assert_eq!(err.to_string(), "Input file is empty");
    }

    #[test]
    fn all_invalid_lines_abort() {
        let err = convert_text("vmess://x\nss://%%%@h:1\n", default_template().unwrap())
            .unwrap_err();
        match &err {
            ConvertError::NoValidProxies(batch) => {
                assert_eq!(batch.total(), 2);
                assert_eq!(batch.failures().count(), 2);
            }
            other => panic!("expected NoValidProxies, got {:?}", other),
        }
        assert!(err.to_string().contains("(0/2 processed)"));
    }

    #[test]
    fn partial_batch_keeps_valid_subset() {
        let text = "trojan://pw@host.com:443#T1\nvmess://x\nhysteria2://h.com#H1\n";
        let conversion = convert_text(text, default_template().unwrap()).unwrap();
        assert_eq!(conversion.batch.succeeded(), 2);
        assert_eq!(conversion.batch.total(), 3);
        assert_eq!(conversion.config.proxies.len(), 2);
        assert!(conversion.yaml.contains("name: T1"));
        assert!(conversion.yaml.contains("name: H1"));
    }
}
