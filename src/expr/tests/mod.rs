mod tests_logical;
