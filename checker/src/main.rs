mod cli;

use std::process::ExitCode;

use clap::Parser;

use approxsim_model::{
    find_unresolved, import_document, DiagnosticList, ImportFailure, ObjectFactory, ObjectId,
    ObjectKind, ObjectTree, SimpleValue,
};
use approxsim_schema::{read_schema, TypeRegistry};

fn main() -> ExitCode {
    let cli = cli::Cli::parse();

    let schema_source = match std::fs::read_to_string(&cli.schema) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", cli.schema.display());
            return ExitCode::FAILURE;
        }
    };
    let schema_document = match roxmltree::Document::parse(&schema_source) {
        Ok(document) => document,
        Err(e) => {
            eprintln!("error: {}: {e}", cli.schema.display());
            return ExitCode::FAILURE;
        }
    };
    let (registry, warnings) = match read_schema(&schema_document) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("error: {}: {e}", cli.schema.display());
            return ExitCode::FAILURE;
        }
    };
    for warning in &warnings {
        eprintln!("{}: warning: {warning}", cli.schema.display());
    }

    let scenario = match std::fs::read_to_string(&cli.scenario) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", cli.scenario.display());
            return ExitCode::FAILURE;
        }
    };

    let factory = ObjectFactory::new(&registry);
    let mut tree = ObjectTree::new();
    match import_document(&scenario, &registry, &factory, &mut tree) {
        Ok(outcome) => {
            print_diagnostics(&outcome.diagnostics, cli.max_print);
            if cli.dump_tree {
                dump_tree(&tree, &registry, outcome.root, 0);
            }
            let mut failed = outcome.diagnostics.has_errors();
            if cli.check_references {
                for node in find_unresolved(&tree, outcome.root) {
                    eprintln!("unresolved reference at {}", tree.reference_to(node));
                    failed = true;
                }
            }
            if failed {
                ExitCode::FAILURE
            } else {
                println!("{}: OK", cli.scenario.display());
                ExitCode::SUCCESS
            }
        }
        Err(ImportFailure::TooManyErrors(diagnostics) | ImportFailure::NoRoot(diagnostics)) => {
            print_diagnostics(&diagnostics, cli.max_print);
            eprintln!("error: import aborted");
            ExitCode::FAILURE
        }
        Err(failure) => {
            eprintln!("error: {failure}");
            ExitCode::FAILURE
        }
    }
}

fn print_diagnostics(diagnostics: &DiagnosticList, max_print: usize) {
    for diagnostic in diagnostics.iter().take(max_print) {
        eprintln!("{diagnostic}");
    }
    if diagnostics.len() > max_print {
        eprintln!("... and {} more", diagnostics.len() - max_print);
    }
}

fn dump_tree(tree: &ObjectTree, registry: &TypeRegistry, node: ObjectId, depth: usize) {
    let indent = "  ".repeat(depth);
    let type_name = &registry.resolve(tree.type_of(node)).name.local_name;
    match tree.node(node).kind() {
        ObjectKind::Simple(SimpleValue::Reference(reference)) => {
            println!("{indent}{} : {type_name} -> {reference}", tree.identifier(node));
        }
        ObjectKind::Simple(SimpleValue::Point { lat, lon }) => {
            println!(
                "{indent}{} : {type_name} = ({lat}, {lon})",
                tree.identifier(node)
            );
        }
        ObjectKind::Simple(SimpleValue::SymbolCode(code)) => {
            println!("{indent}{} : {type_name} = {code}", tree.identifier(node));
        }
        ObjectKind::Simple(value) => {
            println!(
                "{indent}{} : {type_name} = {}",
                tree.identifier(node),
                value.lexical()
            );
        }
        _ => {
            println!("{indent}{} : {type_name}", tree.identifier(node));
            for child in tree.children(node) {
                dump_tree(tree, registry, child, depth + 1);
            }
        }
    }
}
