pub mod cli_harness;
