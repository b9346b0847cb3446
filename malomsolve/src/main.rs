#![doc = include_str!("../README.md")]

use clap::{Parser, Subcommand};
use malom::SectorGraph;

mod db;
use db::DbConf;

mod build;
use build::BuildConf;

mod query;
use query::QueryConf;

mod check;
use check::SelftestConf;

#[derive(Subcommand)]
pub enum Command {
    /// Solve all sectors whose files are missing
    Build(BuildConf),
    /// Print the value and the best moves of a position
    Query(QueryConf),
    /// Check the database files and print their statistics
    Verify,
    /// Print the sector graph and the solving order of its units
    Graph,
    /// Check the consistency of tables and move generators
    Selftest(SelftestConf),
    /// Find positions in which closing or blocking a mill loses and save them
    Traps,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Nine Men's Morris endgame database builder.
pub struct Conf {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub db: DbConf,
}

fn print_graph(db: &DbConf) -> anyhow::Result<()> {
    let rules = db.rules()?;
    let graph = SectorGraph::new(&rules, false);
    println!("{} sectors reachable from {}", graph.len(), graph.root());
    for wu in graph.solve_order()? {
        print!("{}", wu.id);
        if wu.twine { print!(" (twine)"); }
        if wu.transient { print!(" (transient)"); }
        let children: Vec<String> = wu.children.iter().map(|c| c.to_string()).collect();
        println!(" -> {}", children.join(" "));
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let conf: Conf = Conf::parse();
    match conf.command {
        Command::Build(build) => build.run(&conf.db),
        Command::Query(query) => query.run(&conf.db),
        Command::Verify => check::verify(&conf.db),
        Command::Graph => print_graph(&conf.db),
        Command::Selftest(selftest) => selftest.run(&conf.db),
        Command::Traps => build::build_traps(&conf.db),
    }
}
