use std::env::var;
use std::fs;
use std::path::PathBuf;

use fieldguard_core::RuleCatalog;
use fieldguard_generate::{DEFAULT_RUNTIME_CRATE, Pipeline};
use fieldguard_introspect::{IntrospectOptions, SourceUnit};

const SOURCES: [&str; 2] = ["src/app.rs", "src/models.rs"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rustc-check-cfg=cfg(fieldguard)");

    let manifest_dir = PathBuf::from(var("CARGO_MANIFEST_DIR")?);
    let mut units = Vec::with_capacity(SOURCES.len());
    for source in SOURCES {
        println!("cargo:rerun-if-changed={source}");
        units.push(SourceUnit::new(source, fs::read_to_string(manifest_dir.join(source))?));
    }

    let mut pipeline = Pipeline::new(
        IntrospectOptions::default(),
        RuleCatalog::builtin(),
        DEFAULT_RUNTIME_CRATE,
    );
    let output = pipeline.run(&units)?;
    for diagnostic in output.plans.diagnostics.iter() {
        println!("cargo:warning={diagnostic}");
    }

    let out_dir = PathBuf::from(var("OUT_DIR")?);
    for file in &output.files {
        fs::write(out_dir.join(&file.name), &file.contents)?;
    }
    Ok(())
}
