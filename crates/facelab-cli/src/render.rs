//! Terminal views for each lab step and the printable summary report.

use chrono::NaiveDate;
use facelab_core::report::{classify, Section};
use facelab_core::{ComparisonResult, InferenceBackend, LabLog, LabStep, Progress, Wizard};
use std::fmt::Write;

const SPECTRUM_BARS: usize = 15;
/// Fixed confidence threshold shown on the printed report.
const CONFIDENCE_THRESHOLD: &str = "85% Fix";
const REFLECTION: &str = "通过本次探究，我学习到：人脸识别的核心不在于单纯的“对比图像”，而是在于“高维向量匹配”。\
机器通过卷积神经网络提取面部几何关系、纹理特征，将其映射到多维空间中计算余弦相似度。\
这不仅展示了 AI 处理海量非结构化数据的能力，也启发了我在智能物联时代对个人生物信息安全的思考。";
const RULE: &str = "────────────────────────────────────────────────────────";

/// Progress indicator: one marker per step plus the current step's caption.
pub fn progress(progress: Progress, current: LabStep) -> String {
    let markers: Vec<String> = LabStep::ALL
        .iter()
        .map(|step| {
            let mark = match step.cmp(&current) {
                std::cmp::Ordering::Less => "●",
                std::cmp::Ordering::Equal => "◉",
                std::cmp::Ordering::Greater => "○",
            };
            format!("{mark} {} {}", step.number(), step.title())
        })
        .collect();

    format!(
        "{}\n步骤 {} / {} · {} · {} · {}% 完成",
        markers.join("  "),
        progress.number,
        progress.total,
        current.title(),
        current.description(),
        progress.percent,
    )
}

/// Main panel for the wizard's current step.
pub fn step_view<B: InferenceBackend>(wizard: &Wizard<B>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", progress(wizard.progress(), wizard.step()));
    let _ = writeln!(out, "{RULE}");

    match wizard.step() {
        LabStep::Intro => {
            out.push_str("人脸识别模拟实验室\n\n");
            out.push_str("欢迎来到人工智能探究平台。通过图像上传模拟，我们将学习机器是如何“分析”我们的，\n");
            out.push_str("并亲手实现一个虚拟的智能开锁系统。\n\n");
            out.push_str("  任务 1  观察机器如何识别人脸\n");
            out.push_str("  任务 2  将人脸注册到模拟数据库\n");
            out.push_str("  任务 3  使用人脸进行身份验证\n\n");
            out.push_str("输入 start 开始探究任务。\n");
        }
        LabStep::Recognize => {
            out.push_str("探究：机器是如何“认识”我们的？\n");
            out.push_str("请上传一张清晰的人脸照片（upload <图片路径>）。AI 将展示它是如何定位特征点并理解面部结构的。\n\n");
            match wizard.analysis() {
                Some(text) => {
                    out.push_str("机器视觉分析报告\n");
                    out.push_str(&analysis_report(text));
                }
                None => out.push_str("（等待上传图片）\n"),
            }
            out.push_str(&nav_hint(wizard, "下一步：录入数据库"));
        }
        LabStep::Remember => {
            out.push_str("探究：如何让机器“记住”人脸？\n");
            out.push_str("机器需要将注册图片的特征码存入数据库。请上传你想要“注册”到系统的面部图片。\n\n");
            match wizard.enrollment() {
                Some(e) => {
                    let _ = writeln!(out, "✓ 注册成功：{}（{}）", e.name, format_millis(e.timestamp));
                }
                None => out.push_str("（尚未注册）\n"),
            }
            out.push_str(&nav_hint(wizard, "下一步：身份验证"));
        }
        LabStep::Unlock => {
            out.push_str("探究：刷脸开锁是如何工作的？\n");
            out.push_str("上传一张新的照片，系统会将它与注册图像进行比对。\n\n");
            if wizard.enrollment().is_none() {
                out.push_str("⚠ 尚未注册人脸，请先返回上一步完成注册。\n");
            }
            out.push_str(&unlock_panel(wizard.comparison()));
            out.push_str(&nav_hint(wizard, "生成结课报告"));
        }
        LabStep::Report => {
            out.push_str(&summary_report(
                wizard.records(),
                wizard.comparison(),
                &wizard.session_id().to_string(),
                chrono::Local::now().date_naive(),
            ));
            out.push_str("\n输入 save <路径> 导出报告，restart 重新开始实验。\n");
        }
    }
    out
}

fn nav_hint<B: InferenceBackend>(wizard: &Wizard<B>, label: &str) -> String {
    match wizard.blocked_by() {
        None => format!("\n[next] {label}    [back] 返回\n"),
        Some(requires) => format!("\n[next] {label}（不可用：需要{}）    [back] 返回\n", requirement_zh(requires)),
    }
}

fn requirement_zh(requires: facelab_core::Requirement) -> &'static str {
    match requires {
        facelab_core::Requirement::Analysis => "先完成人脸分析",
        facelab_core::Requirement::Enrollment => "先注册人脸",
    }
}

/// Categorised rendering of a describe reply.
pub fn analysis_report(text: &str) -> String {
    let mut out = String::new();
    for Section { kind, content, .. } in classify(text) {
        if kind.has_heading() {
            let _ = writeln!(out, "{} {}", kind.icon(), kind.title());
            let _ = writeln!(out, "   {content}");
        } else {
            let _ = writeln!(out, "{} {content}", kind.icon());
        }
    }
    out.push_str("\n以上分析由多模态 AI 模型生成，仅用于教学演示。\n");
    out
}

fn unlock_panel(comparison: Option<&ComparisonResult>) -> String {
    let Some(c) = comparison else {
        return "状态：等待上传\n[STATE] 等待比对样本...\n".to_string();
    };
    let mut out = String::new();
    let _ = writeln!(out, "状态：{}", if c.matched { "解锁成功 🔓" } else { "匹配失败 🔒" });
    let _ = writeln!(out, "相似度分数: {:.1}%", c.similarity);
    let _ = writeln!(out, "{}", c.explanation);
    let _ = writeln!(out, "[PROC] 提取特征向量 [32, 128, ...]");
    let _ = writeln!(
        out,
        "{}",
        if c.matched {
            "[RESULT] 身份确认，执行解锁指令"
        } else {
            "[RESULT] 相似度过低，拒绝访问"
        }
    );
    out
}

/// Bar string for the similarity spectrum, e.g. `▇▇▇▇▁▁`.
pub fn spectrum(c: &ComparisonResult) -> String {
    c.spectrum(SPECTRUM_BARS)
        .into_iter()
        .map(|lit| if lit { '▇' } else { '▁' })
        .collect()
}

/// Printable Markdown summary of a finished lab session.
pub fn summary_report(
    records: &LabLog,
    comparison: Option<&ComparisonResult>,
    session_id: &str,
    generated: NaiveDate,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# 人脸识别技术探究与模拟实践");
    let _ = writeln!(out);
    let _ = writeln!(out, "AI 探究结课报告 · 人工智能实验室");
    let _ = writeln!(out);
    let _ = writeln!(out, "- 生成时间：{}", generated.format("%Y-%m-%d"));
    let _ = writeln!(out, "- 报告编号：BIOMETRIC_ID_{}", short_id(session_id).to_uppercase());
    let _ = writeln!(out, "- 完成状态：100% 已提交");
    let _ = writeln!(out);

    let _ = writeln!(out, "## 实验背景与目标");
    let _ = writeln!(out);
    let _ = writeln!(out, "- **技术认知**：理解面部特征定位、编码与匹配的逻辑。");
    let _ = writeln!(out, "- **生活实践**：探究刷脸技术在智能物联中的应用。");
    let _ = writeln!(out);

    let _ = writeln!(out, "## 实验流水线记录");
    let _ = writeln!(out);
    if records.is_empty() {
        let _ = writeln!(out, "（暂无实验记录）");
        let _ = writeln!(out);
    }
    for (idx, record) in records.iter().enumerate() {
        let _ = writeln!(out, "### {:02}. {} `LOG_OK`", idx + 1, record.step.record_title());
        let _ = writeln!(out);
        let _ = writeln!(out, "- 执行操作：{}", record.observation);
        let _ = writeln!(out, "- 机器产出结果：");
        let _ = writeln!(out);
        for line in record.result.lines().filter(|l| !l.trim().is_empty()) {
            let _ = writeln!(out, "  > {}", line.trim());
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## 验证汇总");
    let _ = writeln!(out);
    match comparison {
        Some(c) => {
            let _ = writeln!(out, "- 相似度：{:.0}%", c.similarity);
            let _ = writeln!(out, "- 判定：{}", if c.matched { "身份确认" } else { "拒绝访问" });
            let _ = writeln!(out, "- SIM_SPECTRUM：`{}`", spectrum(c));
        }
        None => {
            let _ = writeln!(out, "- 相似度：--%");
            let _ = writeln!(out, "- 判定：未进行身份验证");
        }
    }
    let _ = writeln!(out, "- 匹配状态：{}", match_status(comparison));
    let _ = writeln!(out, "- 置信阈值：{CONFIDENCE_THRESHOLD}");
    let _ = writeln!(out);

    let _ = writeln!(out, "## 总结与反思");
    let _ = writeln!(out);
    let _ = writeln!(out, "> {REFLECTION}");
    let _ = writeln!(out);
    let _ = writeln!(out, "探究者签名：_________________");
    out
}

fn match_status(comparison: Option<&ComparisonResult>) -> &'static str {
    match comparison {
        Some(c) if c.matched => "Passed",
        Some(_) => "Denied",
        None => "None",
    }
}

/// First block of a hyphenated uuid, used as a compact report id.
fn short_id(id: &str) -> &str {
    id.split('-').next().unwrap_or(id)
}

fn format_millis(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use facelab_core::LabRecord;

    fn record(step: LabStep, result: &str) -> LabRecord {
        LabRecord {
            step,
            observation: format!("{} observation", step),
            result: result.into(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 17).unwrap()
    }

    #[test]
    fn test_summary_lists_records_in_step_order() {
        let mut log = LabLog::new();
        log.upsert(record(LabStep::Unlock, "验证通过：门锁已开启"));
        log.upsert(record(LabStep::Recognize, "第一行\n\n第二行"));
        log.upsert(record(LabStep::Remember, "成功：已在系统注册面部指纹。"));
        let c = ComparisonResult {
            matched: true,
            similarity: 88.0,
            explanation: "x".into(),
        };

        let report = summary_report(&log, Some(&c), "abcd1234-0000-0000-0000-000000000000", date());

        let first = report.find("### 01. 人脸特征感知").unwrap();
        let second = report.find("### 02. 特征库注册").unwrap();
        let third = report.find("### 03. 生物特征验证").unwrap();
        assert!(first < second && second < third);
        assert!(!report.contains("### 04."));
        assert!(report.contains("  > 第一行\n  > 第二行\n"));
        assert!(report.contains("2026-10-17"));
        assert!(report.contains("BIOMETRIC_ID_ABCD1234"));
        assert!(report.contains("相似度：88%"));
        assert!(report.contains("身份确认"));
        assert!(report.contains("### 01. 人脸特征感知 `LOG_OK`"));
        assert_eq!(report.matches("`LOG_OK`").count(), 3);
        assert!(report.contains("- 匹配状态：Passed"));
        assert!(report.contains("- 置信阈值：85% Fix"));
        let reflection = report.find("## 总结与反思").unwrap();
        let signature = report.find("探究者签名：").unwrap();
        assert!(third < reflection && reflection < signature);
    }

    #[test]
    fn test_summary_without_comparison() {
        let report = summary_report(&LabLog::new(), None, "id", date());
        assert!(report.contains("（暂无实验记录）"));
        assert!(report.contains("--%"));
        assert!(report.contains("- 匹配状态：None"));
        assert!(report.contains("探究者签名："));
    }

    #[test]
    fn test_summary_denied_status() {
        let c = ComparisonResult {
            matched: false,
            similarity: 12.0,
            explanation: "x".into(),
        };
        let report = summary_report(&LabLog::new(), Some(&c), "id", date());
        assert!(report.contains("- 匹配状态：Denied"));
        assert!(report.contains("拒绝访问"));
    }

    #[test]
    fn test_spectrum_string() {
        let c = ComparisonResult {
            matched: false,
            similarity: 21.0,
            explanation: String::new(),
        };
        // 0, 6.67, 13.33, 20.0 are lit
        assert_eq!(spectrum(&c), "▇▇▇▇▁▁▁▁▁▁▁▁▁▁▁");
    }

    #[test]
    fn test_analysis_report_headings() {
        let out = analysis_report("1. 第一项\n鼻尖清晰\n普通的一句话");
        assert!(out.contains("(1) 第一项"));
        assert!(out.contains("🔍 面部特征检测\n   鼻尖清晰"));
        assert!(out.contains("📋 普通的一句话"));
    }

    #[test]
    fn test_progress_markers() {
        let p = Progress {
            number: 2,
            total: 5,
            percent: 40,
        };
        let out = progress(p, LabStep::Recognize);
        assert!(out.starts_with("● 1 实验介绍  ◉ 2 人脸识别  ○ 3 人脸注册"));
        assert!(out.contains("步骤 2 / 5"));
        assert!(out.contains("40% 完成"));
    }
}
