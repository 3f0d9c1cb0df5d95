mod csv_report;

pub(crate) use csv_report::CsvReport;
