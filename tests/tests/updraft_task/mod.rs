mod config_errors;
mod launch;
mod rollback;
