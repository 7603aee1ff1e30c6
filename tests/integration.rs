// Integration tests module

mod integration {
    mod cli_test;
    mod config_test;

    // Runtime tests drive a fake nvidia-smi shell script
    #[cfg(unix)]
    mod runtime_test;
}
