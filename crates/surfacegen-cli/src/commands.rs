//! Command implementations.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use sha2::{Digest as _, Sha256};
use std::fs;
use std::path::Path;
use surfacegen_core::generate::{GenerationReport, Generator};
use surfacegen_schema::config::ClientConfigV1;
use surfacegen_schema::descriptor_json::load_descriptor_set_json;
use surfacegen_schema::SchemaSet;

struct Inputs {
    schema: SchemaSet,
    config: ClientConfigV1,
    /// `sha256:<hex>` of the descriptor bytes.
    digest: String,
}

fn load_inputs(descriptor: &Path, config: Option<&Path>) -> Result<Inputs> {
    let bytes = fs::read(descriptor)
        .with_context(|| format!("failed to read descriptor set {}", descriptor.display()))?;
    let text = std::str::from_utf8(&bytes)
        .with_context(|| format!("descriptor set {} is not UTF-8", descriptor.display()))?;
    let schema = load_descriptor_set_json(text)
        .with_context(|| format!("failed to load descriptor set {}", descriptor.display()))?;
    let digest = format!("sha256:{:x}", Sha256::digest(&bytes));

    let config = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read client config {}", path.display()))?;
            ClientConfigV1::from_json(&text)
                .with_context(|| format!("invalid client config {}", path.display()))?
        }
        None => ClientConfigV1::empty(),
    };

    tracing::debug!(
        descriptor = %descriptor.display(),
        messages = schema.messages.len(),
        services = schema.services.len(),
        %digest,
        "loaded inputs"
    );
    Ok(Inputs {
        schema,
        config,
        digest,
    })
}

fn run(descriptor: &Path, config: Option<&Path>) -> Result<GenerationReport> {
    let inputs = load_inputs(descriptor, config)?;
    let report = Generator::new(&inputs.schema, &inputs.config)
        .run()
        .with_input_digest(inputs.digest);
    Ok(report)
}

fn print_diagnostics(report: &GenerationReport) {
    for d in &report.diagnostics {
        let location = match &d.path {
            Some(path) => format!("{} ({path})", d.method),
            None => d.method.clone(),
        };
        println!("  {} {} [{}]", "✗".red(), location, d.kind.yellow());
        println!("      {}", d.message.dimmed());
    }
}

fn print_summary(report: &GenerationReport) {
    let s = &report.stats;
    let excluded = if s.excluded == 0 {
        "0 excluded".green()
    } else {
        format!("{} excluded", s.excluded).red()
    };
    println!(
        "  {} services, {} methods, {} surfaces, {}",
        s.services, s.methods, s.surfaces, excluded
    );
}

pub fn cmd_generate(descriptor: &Path, config: Option<&Path>, out: &Path) -> Result<()> {
    let report = run(descriptor, config)?;
    let json = serde_json::to_string_pretty(&report).context("failed to serialize report")?;
    fs::write(out, json).with_context(|| format!("failed to write {}", out.display()))?;

    print_diagnostics(&report);
    print_summary(&report);
    println!("  {} {}", "→".cyan(), out.display());
    Ok(())
}

pub fn cmd_check(descriptor: &Path, config: Option<&Path>) -> Result<()> {
    let report = run(descriptor, config)?;
    print_diagnostics(&report);
    print_summary(&report);
    if !report.is_clean() {
        bail!("{} diagnostic(s)", report.diagnostics.len());
    }
    println!("  {} all methods generated", "✓".green());
    Ok(())
}

pub fn cmd_shapes(descriptor: &Path, config: Option<&Path>) -> Result<()> {
    let report = run(descriptor, config)?;
    for surface in &report.surfaces {
        println!(
            "  {} {} {} → {}",
            surface.method,
            surface.variant.to_string().dimmed(),
            surface.shape.to_string().cyan(),
            surface.call.client_method.bold()
        );
    }
    print_diagnostics(&report);
    Ok(())
}
