mod helpers;
mod tests_iterator;
