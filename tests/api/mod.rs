mod health_tests;
mod stats_tests;
