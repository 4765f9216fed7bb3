use std::fmt;

/// Panel a preset command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplatePanel {
    Sql,
    Ssh,
    Cmd,
}

const SQL_TEMPLATES: &[&str] = &[
    "SELECT * FROM table LIMIT 10;",
    "INSERT INTO table (col1, col2) VALUES ('val1', 'val2');",
    "UPDATE table SET col1='val1' WHERE id=1;",
    "DELETE FROM table WHERE id=1;",
];

const SSH_TEMPLATES: &[&str] = &[
    "tail -f /var/log/nginx/access.log",
    "ls -l /root",
    "df -h",
    "top -n 1",
    "netstat -tulpn",
];

const CMD_TEMPLATES: &[&str] = &[
    "ipconfig",
    "dir",
    "ping www.baidu.com",
    "netstat -ano",
    "tasklist",
];

impl TemplatePanel {
    pub const ALL: [Self; 3] = [Self::Sql, Self::Ssh, Self::Cmd];

    /// Preset commands offered as starting points, in display order.
    #[must_use]
    pub fn templates(self) -> &'static [&'static str] {
        match self {
            Self::Sql => SQL_TEMPLATES,
            Self::Ssh => SSH_TEMPLATES,
            Self::Cmd => CMD_TEMPLATES,
        }
    }

    /// One-based lookup, matching the numbering shown to users.
    #[must_use]
    pub fn template(self, number: usize) -> Option<&'static str> {
        number
            .checked_sub(1)
            .and_then(|index| self.templates().get(index).copied())
    }
}

impl fmt::Display for TemplatePanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sql => "sql",
            Self::Ssh => "ssh",
            Self::Cmd => "cmd",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::TemplatePanel;
    use crate::execution::validate_command;
    use crate::sql::SqlStatementKind;

    #[test]
    fn every_template_is_a_runnable_command() {
        for panel in TemplatePanel::ALL {
            assert!(!panel.templates().is_empty(), "{panel} has no templates");
            for template in panel.templates() {
                assert!(validate_command(template).is_ok(), "{template}");
            }
        }
    }

    #[test]
    fn sql_templates_cover_each_statement_kind() {
        let kinds = TemplatePanel::Sql
            .templates()
            .iter()
            .map(|text| SqlStatementKind::classify(text))
            .collect::<Vec<_>>();

        assert_eq!(
            kinds,
            [
                SqlStatementKind::Select,
                SqlStatementKind::Insert,
                SqlStatementKind::Update,
                SqlStatementKind::Delete
            ]
        );
    }

    #[test]
    fn lookup_is_one_based() {
        assert_eq!(TemplatePanel::Ssh.template(3), Some("df -h"));
        assert_eq!(TemplatePanel::Cmd.template(1), Some("ipconfig"));
        assert_eq!(TemplatePanel::Cmd.template(0), None);
        assert_eq!(TemplatePanel::Sql.template(5), None);
    }
}
