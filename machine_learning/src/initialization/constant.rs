use super::ParamGen;

/// Fills a fixed amount of parameters with a single value.
///
/// Every bias of the decoder comes from one of these, built with `zeros`.
pub struct ConstParamGen {
    value: f32,
    left: usize,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` that yields `value` exactly `limit` times.
    pub fn new(value: f32, limit: usize) -> Self {
        Self { value, left: limit }
    }

    /// Creates a `ConstParamGen` for `limit` zeroed parameters.
    pub fn zeros(limit: usize) -> Self {
        Self::new(0., limit)
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let taken = n.min(self.left);

        if taken == 0 && self.left == 0 {
            return None;
        }

        self.left -= taken;
        Some(vec![self.value; taken])
    }
}
