//! `brodnik-demo`: push a run of integers onto a Brodnik array and show
//! its O(1) amortized growth and random-access indexing.

use rt_runtime::rt_collections::BrodnikArray;

use crate::commands::traits::Command;
use crate::error::Result;

/// Arguments for the `brodnik-demo` subcommand.
pub struct BrodnikDemoArgs {
    /// How many elements to append.
    pub count: usize,
    /// Indices to sample with `at` after the array is built.
    pub sample: Vec<usize>,
}

pub struct BrodnikDemoCommand {
    args: BrodnikDemoArgs,
}

impl Command for BrodnikDemoCommand {
    type Args = BrodnikDemoArgs;

    fn new(args: BrodnikDemoArgs) -> Self {
        BrodnikDemoCommand { args }
    }

    fn execute(&self) -> Result<()> {
        run_brodnik_demo(&self.args)
    }

    fn name() -> &'static str {
        "brodnik-demo"
    }
}

pub fn run_brodnik_demo(args: &BrodnikDemoArgs) -> Result<()> {
    let mut array = BrodnikArray::new();
    for i in 0..args.count {
        array.append(i);
    }
    println!("appended {} elements, len={}", args.count, array.len());

    for &index in &args.sample {
        match array.at(index) {
            Some(value) => println!("at({index}) = {value}"),
            None => println!("at({index}) = <out of range>"),
        }
    }

    if let Some(last) = array.detach() {
        println!("detach() -> {last}, len now {}", array.len());
    }

    Ok(())
}
