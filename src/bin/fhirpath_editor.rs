// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command-line front end for the structured FHIRPath editor
//!
//! Programs, contexts and external bindings are read as JSON files in the
//! same shape the editor persists them.

use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use octofhir_fhirpath_editor::analyzer::DiagnosticSeverity;
use octofhir_fhirpath_editor::model::{MockSchemaProvider, SchemaRegistry};
use octofhir_fhirpath_editor::{Context, EditorEngine, ExternalBinding, Program, Target};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "fhirpath-editor")]
#[command(about = "Type, complete and compile structured FHIRPath programs")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    #[command(flatten)]
    environment: Environment,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Environment {
    /// JSON file with the root context (`{"type": ..., "value": ...}`)
    #[arg(long, global = true)]
    context: Option<PathBuf>,
    /// JSON file with an array of external bindings
    #[arg(long, global = true)]
    externals: Option<PathBuf>,
    /// JSON file with FHIR schemas keyed by type name (built-in subset if omitted)
    #[arg(long, global = true)]
    schema: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a program to FHIRPath
    Compile {
        /// JSON file containing the program
        program: PathBuf,
    },
    /// Print the type of every binding and of the final expression
    Types {
        /// JSON file containing the program
        program: PathBuf,
    },
    /// List the tokens that may be appended to an expression
    Suggest {
        /// JSON file containing the program
        program: PathBuf,
        /// Suggest for this local binding instead of the final expression
        #[arg(long)]
        binding: Option<String>,
        /// Text typed so far
        #[arg(long)]
        input: Option<String>,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Report dangling references, type errors and unused bindings
    Lint {
        /// JSON file containing the program
        program: PathBuf,
    },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Error reading file '{}'", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Error parsing JSON '{}'", path.display()))
}

fn build_engine(environment: &Environment) -> Result<EditorEngine<SchemaRegistry>> {
    let registry = match &environment.schema {
        Some(path) => {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Error reading schema '{}'", path.display()))?;
            SchemaRegistry::from_json(&content)?
        }
        None => MockSchemaProvider::new().registry().clone(),
    };
    log::debug!("loaded {} schemas", registry.len());

    let context: Context = match &environment.context {
        Some(path) => read_json(path)?,
        None => Context::default(),
    };
    let externals: Vec<ExternalBinding> = match &environment.externals {
        Some(path) => read_json(path)?,
        None => Vec::new(),
    };

    Ok(EditorEngine::builder(Arc::new(registry))
        .context(context)
        .externals(externals)
        .build())
}

fn main() -> Result<()> {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new().filter_level(level).init();

    let engine = build_engine(&cli.environment)?;

    match cli.command {
        Commands::Compile { program } => {
            let program: Program = read_json(&program)?;
            println!("{}", engine.compile(&program));
        }
        Commands::Types { program } => {
            let program: Program = read_json(&program)?;
            let types = engine.types(&program);
            for binding in &program.bindings {
                if let Some(ty) = types.binding(&binding.id) {
                    println!("{}: {ty}", binding.name);
                }
            }
            let incomplete = if types.expression.incomplete {
                " (incomplete)"
            } else {
                ""
            };
            println!("=> {}{incomplete}", types.expression.ty);
        }
        Commands::Suggest {
            program,
            binding,
            input,
            pretty,
        } => {
            let program: Program = read_json(&program)?;
            let target = binding.map_or(Target::Expression, Target::Binding);
            let suggestions =
                engine.suggest_with_input(&program, &target, input.as_deref().unwrap_or_default());
            let output = if pretty {
                serde_json::to_string_pretty(&suggestions)?
            } else {
                serde_json::to_string(&suggestions)?
            };
            println!("{output}");
        }
        Commands::Lint { program } => {
            let program: Program = read_json(&program)?;
            let diagnostics = engine.lint(&program);
            for diagnostic in &diagnostics {
                println!("{diagnostic}");
            }
            if diagnostics
                .iter()
                .any(|d| d.severity == DiagnosticSeverity::Error)
            {
                anyhow::bail!("{} problems found", diagnostics.len());
            }
        }
    }

    Ok(())
}
