//! Fixed instructions and user-facing fallback strings.

pub const DESCRIBE_PROMPT: &str = "作为人工智能计算机视觉专家，为教育模拟分析这张人脸。
请用中文描述：
1. 检测到的关键特征点（如：瞳孔中心、鼻尖、嘴角）。
2. 机器如何将这些特征转换为数值化的“面部指纹”（嵌入向量）。
3. 拍摄的光照和质量评价。
语言要专业且适合学生阅读。";

pub const COMPARE_PROMPT: &str = "对比这两张图片中的人脸。它们是同一个人吗？请分析它们的面部特征相似度，并以 JSON 格式返回结果。
只返回一个 JSON 对象，包含以下字段：
- \"match\"：布尔值，如果两张人脸被判定为同一人则为 true；
- \"similarity\"：数字，相似度分数，范围 0 到 100；
- \"explanation\"：字符串，比对结果的详细中文说明。";

/// Returned by describe when the service replied with no text.
pub const DESCRIBE_EMPTY: &str = "分析结果生成失败。";

/// Returned by describe on any transport or decoding failure.
pub const DESCRIBE_FAILED: &str = "分析过程中发生错误，请检查网络连接或 API 配置。";

/// Explanation returned by compare on any transport or decoding failure.
pub const COMPARE_FAILED: &str = "人脸比对失败，无法提取有效的比对特征。";
