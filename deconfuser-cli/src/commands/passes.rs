use deconfuser::deobfuscation::PassScheduler;
use serde::Serialize;

use crate::{
    app::GlobalOptions,
    output::{print_output, Align, TabWriter},
};

#[derive(Debug, Serialize)]
struct PassInfo {
    step: usize,
    name: &'static str,
    sandbox: bool,
    description: &'static str,
}

pub fn run(opts: &GlobalOptions) -> anyhow::Result<()> {
    let passes: Vec<PassInfo> = PassScheduler::new()
        .passes()
        .enumerate()
        .map(|(i, pass)| PassInfo {
            step: i + 1,
            name: pass.name(),
            sandbox: pass.id().uses_oracle(),
            description: pass.description(),
        })
        .collect();

    print_output(&passes, opts, |passes| {
        let mut table = TabWriter::new(&[
            ("#", Align::Right),
            ("PASS", Align::Left),
            ("SANDBOX", Align::Left),
            ("DESCRIPTION", Align::Left),
        ]);
        for p in passes {
            table.row(vec![
                p.step.to_string(),
                p.name.to_string(),
                if p.sandbox { "yes" } else { "" }.to_string(),
                p.description.to_string(),
            ]);
        }
        table.print();
    })
}
