use tag_compliance_core::contract::EvaluationRecord;

pub trait EvaluationSink {
    fn put_evaluation(&self, record: &EvaluationRecord, result_token: &str) -> Result<(), String>;
}
