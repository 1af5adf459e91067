use crate::cli::ConfigArgs;
use crate::exit_codes;
use crate::output;
use motionwatch_rs::MonitorConfig;

pub fn execute(args: ConfigArgs) -> i32 {
    match output::emit(&MonitorConfig::default(), args.compact, None) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            exit_codes::EXECUTION_ERROR
        }
    }
}
