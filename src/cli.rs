/// interactive menu and the non-interactive `solve` command
pub mod cli_main;
