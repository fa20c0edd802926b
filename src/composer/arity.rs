use getset::{CopyGetters, Getters};

/// Declared number of weak and strong arguments of a Composer.
///
/// Names are optional, and only used for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, CopyGetters, Getters)]
pub struct Arity {
    #[getset(get_copy = "pub")]
    weak: usize,
    #[getset(get_copy = "pub")]
    strong: usize,
    #[getset(get = "pub")]
    weak_names: Vec<String>,
    #[getset(get = "pub")]
    strong_names: Vec<String>,
}

impl Arity {
    pub fn new(weak: usize, strong: usize) -> Self {
        Self {
            weak,
            strong,
            weak_names: Vec::new(),
            strong_names: Vec::new(),
        }
    }

    /// Arity given by argument names.
    pub fn named(weak: &[&str], strong: &[&str]) -> Self {
        Self {
            weak: weak.len(),
            strong: strong.len(),
            weak_names: weak.iter().map(|name| name.to_string()).collect(),
            strong_names: strong.iter().map(|name| name.to_string()).collect(),
        }
    }

    pub fn weak_name(&self, position: usize) -> Option<&str> {
        self.weak_names.get(position).map(String::as_str)
    }

    pub fn strong_name(&self, position: usize) -> Option<&str> {
        self.strong_names.get(position).map(String::as_str)
    }

    /// Total number of arguments.
    pub fn len(&self) -> usize {
        self.weak + self.strong
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.weak_names.is_empty() && self.strong_names.is_empty() {
            write!(f, "({} weak, {} strong)", self.weak, self.strong)
        } else {
            write!(
                f,
                "(weak: [{}], strong: [{}])",
                self.weak_names.join(", "),
                self.strong_names.join(", ")
            )
        }
    }
}
