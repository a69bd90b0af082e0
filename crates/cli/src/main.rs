use std::process::ExitCode;

mod cmd;
mod output;
mod usage;

fn main() -> ExitCode {
  let args: Vec<String> = std::env::args_os()
    .skip(1)
    .map(|arg| arg.to_string_lossy().into_owned())
    .collect();

  match cmd::cmd_build(&args) {
    Ok(code) => code,
    Err(e) => {
      output::print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}
