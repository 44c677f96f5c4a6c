//! Subcommand implementations.

use std::io::Write;

use clap::{Args, Subcommand};
use serde::Serialize;
use tracing::info;

use dirtree_core::node::DirectoryNode;
use dirtree_core::search::{SearchScope, ALL_OBJECTS_FILTER};
use dirtree_ldap::DirectoryService;

use crate::error::CliResult;

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the top entries of the directory
    Roots,

    /// List the immediate children of an entry
    Children(DnArgs),

    /// Show the attributes of an entry
    Attrs(DnArgs),

    /// Search below an entry
    Search(SearchArgs),

    /// Print the tree rooted at an entry
    Tree(TreeArgs),

    /// Print one tree per naming context (slow on large directories)
    Forest,

    /// Show the object class definitions of an entry
    Schema(DnArgs),
}

#[derive(Debug, Args)]
pub struct DnArgs {
    /// Distinguished name, e.g. "ou=people,dc=example,dc=com"
    pub dn: String,
}

#[derive(Debug, Args)]
pub struct SearchArgs {
    /// Base distinguished name
    pub dn: String,

    /// LDAP filter, e.g. "(cn=abc*)"
    #[arg(default_value = ALL_OBJECTS_FILTER)]
    pub filter: String,

    /// Search scope: base, one or sub
    #[arg(long, short, default_value = "sub")]
    pub scope: SearchScope,
}

#[derive(Debug, Args)]
pub struct TreeArgs {
    /// Distinguished name of the root entry
    pub dn: String,

    /// Build level by level instead of from one subtree search
    #[arg(long)]
    pub slow: bool,
}

/// Where and how results are written.
pub struct Output {
    pub json: bool,
}

impl Output {
    fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> CliResult<()> {
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, value)?;
        writeln!(stdout)?;
        Ok(())
    }

    fn write_nodes(&self, nodes: &[DirectoryNode]) -> CliResult<()> {
        if self.json {
            return self.write_json(nodes);
        }
        let mut stdout = std::io::stdout().lock();
        for node in nodes {
            writeln!(stdout, "{node}")?;
        }
        Ok(())
    }

    fn write_display<T: Serialize + std::fmt::Display>(&self, value: &T) -> CliResult<()> {
        if self.json {
            return self.write_json(value);
        }
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{value}")?;
        Ok(())
    }
}

pub async fn execute(
    command: Commands,
    service: &mut DirectoryService,
    output: &Output,
) -> CliResult<()> {
    match command {
        Commands::Roots => {
            let roots = service.get_roots().await?;
            output.write_nodes(&roots)
        }
        Commands::Children(args) => {
            let children = service.get_children(&args.dn).await?;
            output.write_nodes(&children)
        }
        Commands::Attrs(args) => {
            let node = service.get_node(&args.dn).await?;
            output.write_display(&node)
        }
        Commands::Search(args) => {
            let nodes = service.search(&args.dn, &args.filter, args.scope).await?;
            info!(matches = nodes.len(), "Search finished");
            output.write_nodes(&nodes)
        }
        Commands::Tree(args) => {
            let tree = if args.slow {
                service.build_tree_slow(&args.dn).await?
            } else {
                service.build_tree_fast(&args.dn).await?
            };
            info!(nodes = tree.size(), "Tree built");
            output.write_display(&tree)
        }
        Commands::Forest => {
            #[allow(deprecated)]
            let trees = service.list_all_root_trees().await?;
            if output.json {
                return output.write_json(&trees);
            }
            let mut stdout = std::io::stdout().lock();
            for tree in &trees {
                writeln!(stdout, "{tree}")?;
            }
            Ok(())
        }
        Commands::Schema(args) => {
            let classes = service.get_schema(&args.dn).await?;
            if output.json {
                return output.write_json(&classes);
            }
            let mut stdout = std::io::stdout().lock();
            for class in &classes {
                match &class.definition {
                    Some(definition) => writeln!(stdout, "{}\t{}", class.name, definition)?,
                    None => writeln!(stdout, "{}\t(no definition)", class.name)?,
                }
            }
            Ok(())
        }
    }
}
