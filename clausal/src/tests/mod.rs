
// Session and runner tests
mod runner;
