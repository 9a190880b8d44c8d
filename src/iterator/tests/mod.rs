mod helpers;
mod tests_sequential;
