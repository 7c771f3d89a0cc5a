use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use vista_session::{Configuration, Object, ResultView, Session, SortSpec};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let output = match cli.command {
        Command::Schema(args) => cmd_schema(args, cli.format)?,
        Command::Count(args) => cmd_count(args, cli.format)?,
        Command::Query(args) => cmd_query(args, cli.format)?,
    };
    println!("{output}");
    Ok(())
}

/// Open an existing store file with the schema it was written with.
fn open(path: &str) -> anyhow::Result<Session> {
    if !Path::new(path).is_file() {
        bail!("no store at {path}");
    }
    Session::open(Configuration::new(path)).with_context(|| format!("failed to open {path}"))
}

fn view(session: &Session, object_type: &str, filter: Option<&str>) -> anyhow::Result<ResultView> {
    let view = match filter {
        Some(predicate) => session.objects_where(object_type, predicate, &[])?,
        None => session.objects(object_type)?,
    };
    Ok(view)
}

fn cmd_schema(args: SchemaArgs, format: OutputFormat) -> anyhow::Result<String> {
    let session = open(&args.path)?;
    let schema = session.schema();
    let version = session.schema_version()?;
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&json!({
            "version": version.to_string(),
            "types": schema.to_vec(),
        }))?);
    }

    let mut out = format!("Schema version {}", version.to_string().bold());
    for ty in schema.iter() {
        out.push_str(&format!("\n{}", ty.name.cyan().bold()));
        for prop in &ty.properties {
            let mut line = format!("\n  {:<16} {}", prop.name, prop.property_type);
            if prop.optional {
                line.push('?');
            }
            if ty.primary_key.as_deref() == Some(prop.name.as_str()) {
                line.push_str(&format!(" {}", "primary key".yellow()));
            }
            if let Some(default) = &prop.default {
                line.push_str(&format!(" = {default}"));
            }
            out.push_str(&line);
        }
    }
    Ok(out)
}

fn cmd_count(args: CountArgs, format: OutputFormat) -> anyhow::Result<String> {
    let session = open(&args.path)?;
    let count = view(&session, &args.object_type, args.filter.as_deref())?.len()?;
    Ok(match format {
        OutputFormat::Json => json!({ "type": args.object_type, "count": count }).to_string(),
        OutputFormat::Text => count.to_string(),
    })
}

fn cmd_query(args: QueryArgs, format: OutputFormat) -> anyhow::Result<String> {
    let session = open(&args.path)?;
    let mut results = view(&session, &args.object_type, args.filter.as_deref())?;
    if !args.sort.is_empty() {
        results = results.sorted(SortSpec::from(args.sort))?;
    }
    let limit = args.limit.unwrap_or(usize::MAX);
    let objects: Vec<Object> = results.iter()?.take(limit).collect();

    match format {
        OutputFormat::Json => {
            let rows = objects.iter().map(object_json).collect::<anyhow::Result<Vec<_>>>()?;
            Ok(serde_json::to_string_pretty(&rows)?)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for object in &objects {
                let mut line = format!("@{}", object.key()).dimmed().to_string();
                for prop in &object.object_schema().properties {
                    line.push_str(&format!(" {}={}", prop.name.cyan(), object.get(&prop.name)?));
                }
                out.push_str(&line);
                out.push('\n');
            }
            out.push_str(&format!("{} of {} objects", objects.len(), results.len()?));
            Ok(out)
        }
    }
}

fn object_json(object: &Object) -> anyhow::Result<serde_json::Value> {
    let mut map = serde_json::Map::new();
    map.insert("_key".into(), json!(object.key().get()));
    for prop in &object.object_schema().properties {
        map.insert(prop.name.clone(), object.get(&prop.name)?.to_json());
    }
    Ok(serde_json::Value::Object(map))
}
