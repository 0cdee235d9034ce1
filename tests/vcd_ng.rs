//! Cross-check the symbol table and change parser against the
//! `vcd-ng` reader.

use vcdtoggle::*;
use vcd_ng::{ FastFlow, FastFlowToken, Parser, ScopeItem };
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

const FILES: [&str; 2] = ["inputs/scenario.vcd", "inputs/counter.vcd"];

fn collect_vars(items: &[ScopeItem], out: &mut Vec<(u64, u32)>) {
    for i in items {
        match i {
            ScopeItem::Var(var) => out.push((var.code.0 as u64, var.size as u32)),
            ScopeItem::Scope(scope) => collect_vars(&scope.children[..], out),
            _ => {}
        }
    }
}

#[test]
fn test_declarations_match_vcd_ng() {
    for filename in FILES {
        let f = File::open(filename).unwrap();
        let mut f = BufReader::with_capacity(65536, f);
        let mut parser = Parser::new(&mut f);
        let header = parser.parse_header().unwrap();
        let mut decls = Vec::new();
        collect_vars(&header.items[..], &mut decls);
        let widths: HashMap<u64, u32> = decls.iter().copied().collect();

        let mut line = 0;
        let names = symbols::read_preamble(
            &mut BufReader::new(File::open(filename).unwrap()),
            &ToggleOptions::default(),
            &mut line,
        ).unwrap();
        assert_eq!(names.len(), decls.len(), "{filename}");
        let table = SymbolTable::build(names);
        assert_eq!(table.len(), widths.len(), "{filename}");
        let mut ours: Vec<u32> = table.vars().iter().map(|v| v.width).collect();
        let mut theirs: Vec<u32> = widths.values().copied().collect();
        ours.sort();
        theirs.sort();
        assert_eq!(ours, theirs, "{filename}");
        let aliases: u32 = table.vars().iter().map(|v| v.alias_count).sum();
        assert_eq!(aliases as usize, decls.len(), "{filename}");
    }
}

#[test]
fn test_value_changes_match_vcd_ng() {
    for filename in FILES {
        let mut flow = FastFlow::new(File::open(filename).unwrap(), 65536);
        let mut changes = 0u64;
        let mut last_time = 0;
        while let Some(tok) = flow.next_token().unwrap() {
            match tok {
                FastFlowToken::Timestamp(t) => last_time = t,
                FastFlowToken::Value(_) => changes += 1,
            }
        }
        let opts = ToggleOptions { timing_fragment: "cycle".into(), ..Default::default() };
        let t = read_toggles(filename, &opts).unwrap();
        assert_eq!(t.stats.updates, changes, "{filename}");
        assert_eq!(t.stats.last_time, last_time, "{filename}");
        assert_eq!(t.stats.record_errors(), 0, "{filename}");
    }
}
