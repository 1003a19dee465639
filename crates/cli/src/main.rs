use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use flowref_engine::{
    ActionCatalog, Dictionary, ExecutionOrder, IdentityTranslator, StepGraph, Translate, candidates, flow_tags, output_display_name,
    parse_flow_file, parse_str, render_flow, resolve, rewrite_step_parameter, validate_flow,
};
use flowref_types::{FlowDocument, OutputRegistry, OutputType};
use flowref_util::Settings;
use serde_json::{Value, json};
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let settings = Settings::load().context("failed to load settings")?;
    init_tracing(settings.log_filter());
    let matches = build_cli().get_matches();
    let tools = Tools::from_settings(&settings)?;

    match matches.subcommand() {
        Some(("outputs", sub)) => run_outputs(&tools, sub),
        Some(("resolve", sub)) => run_resolve(&tools, sub),
        Some(("check", sub)) => {
            if !run_check(&tools, sub)? {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(("tags", sub)) => run_tags(&tools, sub),
        Some(("candidates", sub)) => run_candidates(&tools, sub),
        Some(("rewrite", sub)) => run_rewrite(&tools, sub),
        Some(("edit", sub)) => run_edit(&tools, sub),
        _ => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}

/// `RUST_LOG` wins over the settings filter; `info` otherwise.
fn init_tracing(settings_filter: Option<&str>) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .or_else(|| settings_filter.map(str::to_string))
        .unwrap_or_else(|| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let flow_arg = || Arg::new("flow").required(true).action(ArgAction::Set).help("Path to a flow YAML/JSON file");
    let step_arg = || Arg::new("step").long("step").short('s').required(true).action(ArgAction::Set).help("Step id");
    let param_arg = || {
        Arg::new("param")
            .long("param")
            .short('p')
            .required(true)
            .action(ArgAction::Set)
            .help("Dotted path of the parameter holding the reference")
    };
    let in_place_arg = || {
        Arg::new("in-place")
            .long("in-place")
            .short('i')
            .action(ArgAction::SetTrue)
            .help("Write the updated flow back to its file")
    };

    Command::new("flowref")
        .about("Inspect, validate and edit variable references in workflow flows")
        .subcommand(Command::new("outputs").about("List step nodes and registered outputs").arg(flow_arg()))
        .subcommand(
            Command::new("resolve")
                .about("Parse and resolve one field value")
                .arg(Arg::new("value").required(true).action(ArgAction::Set).help("Field value, e.g. {{__2.rows.0}}"))
                .arg(Arg::new("flow").long("flow").short('f').required(true).action(ArgAction::Set)),
        )
        .subcommand(Command::new("check").about("Validate every step and reference; exits non-zero when invalid").arg(flow_arg()))
        .subcommand(Command::new("tags").about("Render every reference tag in a flow").arg(flow_arg()))
        .subcommand(
            Command::new("candidates")
                .about("List the outputs a step may reference")
                .arg(flow_arg())
                .arg(step_arg())
                .arg(
                    Arg::new("type")
                        .long("type")
                        .short('t')
                        .action(ArgAction::Append)
                        .help("Restrict to an output type (repeatable)"),
                ),
        )
        .subcommand(
            Command::new("rewrite")
                .about("Replace the nested path of a reference")
                .arg(flow_arg())
                .arg(step_arg())
                .arg(param_arg())
                .arg(Arg::new("remainder").long("remainder").short('r').required(true).action(ArgAction::Set))
                .arg(in_place_arg()),
        )
        .subcommand(
            Command::new("edit")
                .about("Edit the nested path of a reference in the terminal")
                .arg(flow_arg())
                .arg(step_arg())
                .arg(param_arg())
                .arg(in_place_arg()),
        )
}

/// Catalog and translator configured by the settings file.
struct Tools {
    catalog: ActionCatalog,
    translator: Box<dyn Translate>,
}

impl Tools {
    fn from_settings(settings: &Settings) -> Result<Self> {
        debug!(path = %settings.path().display(), "Using settings");
        let mut catalog = ActionCatalog::builtin();
        if let Some(path) = settings.catalog_path() {
            let count = catalog.extend_from_file(&path).context("failed to load action catalog")?;
            debug!(path = %path.display(), count, "Loaded action catalog");
        }
        let translator: Box<dyn Translate> = match settings.translations_path() {
            Some(path) => Box::new(Dictionary::from_file(&path).context("failed to load translations")?),
            None => Box::new(IdentityTranslator),
        };
        Ok(Self { catalog, translator })
    }

    fn load(&self, matches: &ArgMatches) -> Result<(PathBuf, FlowDocument, StepGraph)> {
        let path = PathBuf::from(matches.get_one::<String>("flow").context("missing flow path")?);
        let flow = parse_flow_file(&path)?;
        let graph = StepGraph::build(&flow, &self.catalog).with_context(|| format!("invalid flow: {}", path.display()))?;
        Ok((path, flow, graph))
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("missing --{name}"))
}

fn run_outputs(tools: &Tools, matches: &ArgMatches) -> Result<()> {
    let (_, _, graph) = tools.load(matches)?;
    let nodes: Vec<Value> = graph
        .nodes()
        .map(|node| {
            json!({
                "id": node.id,
                "kind": node.kind,
                "index": node.index,
                "path": node.path.to_string(),
                "operator": node.operator,
            })
        })
        .collect();
    let outputs: Vec<Value> = graph
        .outputs()
        .iter()
        .map(|(key, descriptor)| json!({ "key": key, "name": descriptor.name, "type": descriptor.r#type }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&json!({ "nodes": nodes, "outputs": outputs }))?);
    Ok(())
}

fn run_resolve(tools: &Tools, matches: &ArgMatches) -> Result<()> {
    let value = required(matches, "value")?;
    let (_, _, graph) = tools.load(matches)?;
    let out = resolution(value, graph.outputs(), tools.translator.as_ref());
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// JSON description of how `value` parses and resolves against `registry`.
fn resolution(value: &str, registry: &OutputRegistry, translator: &dyn Translate) -> Value {
    let Some(reference) = parse_str(value) else {
        return json!({ "reference": false });
    };
    match resolve(&reference.raw, registry) {
        Some(resolved) => json!({
            "reference": true,
            "lookup_id": reference.lookup_id,
            "matched_id": resolved.matched_id,
            "remainder": resolved.remainder,
            "name": output_display_name(resolved.descriptor, translator),
            "type": resolved.descriptor.r#type,
        }),
        None => json!({
            "reference": true,
            "lookup_id": reference.lookup_id,
            "error": translator.translate(flowref_engine::render::NOT_FOUND_KEY, "variable not found"),
        }),
    }
}

/// Prints the report; returns whether the flow is valid.
fn run_check(tools: &Tools, matches: &ArgMatches) -> Result<bool> {
    let (_, flow, graph) = tools.load(matches)?;
    let report = validate_flow(&flow, &graph, &tools.catalog, &ExecutionOrder);
    for diagnostic in &report.references {
        eprintln!("{} {}: {} ({})", diagnostic.step_id, diagnostic.location, diagnostic.issue, diagnostic.token);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.is_valid())
}

fn run_tags(tools: &Tools, matches: &ArgMatches) -> Result<()> {
    let (_, flow, graph) = tools.load(matches)?;
    for located in flow_tags(&flow, &graph, &ExecutionOrder, tools.translator.as_ref()) {
        let tag = &located.tag;
        match tag.issue {
            Some(issue) => println!("{} {}: {} [{}]", located.step_id, located.location, tag.display_text(), issue),
            None => println!("{} {}: {}", located.step_id, located.location, tag.display_text()),
        }
    }
    Ok(())
}

fn run_candidates(tools: &Tools, matches: &ArgMatches) -> Result<()> {
    let step = required(matches, "step")?;
    let (_, _, graph) = tools.load(matches)?;
    let types: Vec<OutputType> = matches
        .get_many::<String>("type")
        .map(|values| values.map(|value| OutputType::from(value.as_str())).collect())
        .unwrap_or_default();
    let listed: Vec<Value> = candidates(&graph, step, &types, &ExecutionOrder)
        .into_iter()
        .map(|candidate| {
            json!({
                "value": candidate.encoded(),
                "step": candidate.node.id,
                "name": output_display_name(candidate.descriptor, tools.translator.as_ref()),
                "type": candidate.descriptor.r#type,
            })
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&listed)?);
    Ok(())
}

fn run_rewrite(tools: &Tools, matches: &ArgMatches) -> Result<()> {
    let step = required(matches, "step")?;
    let param = required(matches, "param")?;
    let remainder = required(matches, "remainder")?;
    let (path, mut flow, graph) = tools.load(matches)?;
    rewrite_step_parameter(&mut flow, step, param, graph.outputs(), remainder, tools.translator.as_ref())?;
    emit_flow(&flow, &path, matches.get_flag("in-place"))
}

fn run_edit(tools: &Tools, matches: &ArgMatches) -> Result<()> {
    let step = required(matches, "step")?;
    let param = required(matches, "param")?;
    let (path, mut flow, graph) = tools.load(matches)?;
    let slot = flow
        .find_step_mut(step)
        .with_context(|| format!("unknown step {step}"))?
        .parameter_mut(param)
        .with_context(|| format!("step {step} has no parameter {param}"))?;
    match flowref_tui::run_editor(slot.clone(), &graph, step, tools.translator.as_ref())? {
        Some(updated) => {
            *slot = Value::String(updated);
            emit_flow(&flow, &path, matches.get_flag("in-place"))
        }
        None => {
            eprintln!("Edit cancelled");
            Ok(())
        }
    }
}

fn emit_flow(flow: &FlowDocument, path: &Path, in_place: bool) -> Result<()> {
    let rendered = render_flow(flow, path)?;
    if in_place {
        std::fs::write(path, rendered).with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        print!("{rendered}");
    }
    Ok(())
}
