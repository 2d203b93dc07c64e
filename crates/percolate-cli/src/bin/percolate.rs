//! Percolate CLI - interactive REPL and one-shot query runner.
//!
//! Usage:
//!   percolate                               # start the REPL
//!   percolate --file g.json --query "..."   # run one query and exit
//!   percolate --file g.json --json --query "..."  # machine-readable output

use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::process;

use clap::Parser;
use percolate_core::{load_file, marshal_result_json, new_graph, save_file, Session};

const HELP_TEXT: &str = "percolate interactive REPL

Commands:
  new <name>           Create a new empty graph
  load <name> <file>   Load a graph from a JSON file
  save <name> <file>   Save a graph's session state to a JSON file
  unload <name>        Remove a loaded graph
  list                 List all loaded graphs
  use <name>           Set the active graph for queries
  help                 Show this help message
  exit / quit          Exit the REPL

Any other input is treated as a DSL query against the active graph.

DSL examples:
  MAXPATH FROM nodeA TO nodeB
  TOPK FROM nodeA TO nodeB K 3
  REACHABILITY FROM nodeA TO nodeB EXACT
  REACHABILITY FROM nodeA TO nodeB MONTECARLO
  CREATE NODE myNode
  CREATE EDGE e1 FROM nodeA TO nodeB PROB 0.8
";

#[derive(Parser)]
#[command(name = "percolate")]
#[command(version)]
#[command(about = "Percolate - probabilistic graph inference engine CLI")]
struct Cli {
    /// Graph JSON file to load into the initial session
    #[arg(short, long, value_name = "FILE")]
    file: Option<String>,

    /// Run a single query and exit instead of starting the REPL
    #[arg(short, long, value_name = "QUERY")]
    query: Option<String>,

    /// Print one-shot results as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let base = match &cli.file {
        Some(path) => match load_file(path) {
            Ok(g) => g,
            Err(e) => {
                eprintln!("error loading {path:?}: {e}");
                process::exit(1);
            }
        },
        None => new_graph(),
    };

    if let Some(query) = &cli.query {
        run_one_shot(base, query, cli.json);
        return;
    }

    run_repl(cli.file.as_deref(), base);
}

fn run_one_shot(base: percolate_core::ProbGraph, query: &str, json: bool) {
    let mut session = Session::from_graph(base);
    match session.query(query) {
        Ok(Some(result)) => {
            if json {
                match marshal_result_json(&result) {
                    Ok(bytes) => {
                        let mut stdout = io::stdout().lock();
                        let _ = stdout.write_all(&bytes);
                        let _ = stdout.write_all(b"\n");
                    }
                    Err(e) => {
                        eprintln!("error encoding result: {e}");
                        process::exit(1);
                    }
                }
            } else {
                println!("{result}");
            }
        }
        Ok(None) => println!("ok"),
        Err(e) => {
            eprintln!("query error: {e}");
            process::exit(1);
        }
    }
}

fn run_repl(initial_file: Option<&str>, base: percolate_core::ProbGraph) {
    let mut sessions: HashMap<String, Session> = HashMap::new();
    let mut active = String::new();

    if initial_file.is_some() {
        sessions.insert("main".to_string(), Session::from_graph(base));
        active = "main".to_string();
    }

    println!("percolate — probabilistic graph inference engine");
    println!("Type \"help\" for available commands.");
    println!();

    let stdin = io::stdin();
    loop {
        if active.is_empty() {
            print!("> ");
        } else {
            print!("[{active}]> ");
        }
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts[0].to_ascii_lowercase().as_str() {
            "exit" | "quit" => return,

            "help" => print!("{HELP_TEXT}"),

            "list" => {
                if sessions.is_empty() {
                    println!("(no graphs loaded)");
                } else {
                    for name in sessions.keys() {
                        let marker = if *name == active { "*" } else { " " };
                        println!("  {marker} {name}");
                    }
                }
            }

            "new" => {
                let Some(name) = parts.get(1) else {
                    eprintln!("usage: new <name>");
                    continue;
                };
                sessions.insert(name.to_string(), Session::from_graph(new_graph()));
                if active.is_empty() {
                    active = name.to_string();
                }
                println!("created empty graph {name:?}");
            }

            "use" => {
                let Some(name) = parts.get(1) else {
                    eprintln!("usage: use <name>");
                    continue;
                };
                if !sessions.contains_key(*name) {
                    eprintln!("no graph named {name:?}");
                    continue;
                }
                active = name.to_string();
                println!("active graph set to {name:?}");
            }

            "load" => {
                let (Some(name), Some(path)) = (parts.get(1), parts.get(2)) else {
                    eprintln!("usage: load <name> <file>");
                    continue;
                };
                match load_file(path) {
                    Ok(graph) => {
                        let nodes = graph.node_count();
                        sessions.insert(name.to_string(), Session::from_graph(graph));
                        if active.is_empty() {
                            active = name.to_string();
                        }
                        println!("loaded {name:?} ({nodes} nodes)");
                    }
                    Err(e) => eprintln!("error loading {path:?}: {e}"),
                }
            }

            "save" => {
                let (Some(name), Some(path)) = (parts.get(1), parts.get(2)) else {
                    eprintln!("usage: save <name> <file>");
                    continue;
                };
                match sessions.get(*name) {
                    Some(session) => match save_file(session.graph(), path) {
                        Ok(()) => println!("saved {name:?} to {path:?}"),
                        Err(e) => eprintln!("error saving {path:?}: {e}"),
                    },
                    None => eprintln!("no graph named {name:?}"),
                }
            }

            "unload" => {
                let Some(name) = parts.get(1) else {
                    eprintln!("usage: unload <name>");
                    continue;
                };
                if sessions.remove(*name).is_none() {
                    eprintln!("no graph named {name:?}");
                    continue;
                }
                if active == *name {
                    active.clear();
                }
                println!("unloaded {name:?}");
            }

            _ => {
                if active.is_empty() {
                    eprintln!("no active graph — use 'new' or 'load' first");
                    continue;
                }
                let Some(session) = sessions.get_mut(&active) else {
                    eprintln!("no active graph — use 'new' or 'load' first");
                    continue;
                };
                match session.query(line) {
                    Ok(Some(result)) => println!("{result}"),
                    Ok(None) => println!("ok"),
                    Err(e) => eprintln!("query error: {e}"),
                }
            }
        }
    }
}
