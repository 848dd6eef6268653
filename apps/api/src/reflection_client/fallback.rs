use crate::notes::models::Reflection;

const KEY_POINTS: [&str; 3] = [
    "การบันทึกความคิดช่วยจัดระเบียบไอเดีย",
    "การสะท้อนคิดอย่างสม่ำเสมอพัฒนาทักษะวิชาชีพ",
    "ความรู้ที่บันทึกไว้สามารถแชร์และสร้างคุณค่าให้องค์กร",
];

const QUESTIONS: [&str; 3] = [
    "ประเด็นหลักของบันทึกนี้คืออะไร?",
    "มีใครที่ควรได้รับประโยชน์จากความรู้นี้?",
    "จะนำไปต่อยอดได้อย่างไร?",
];

const SUGGESTIONS: [&str; 3] = [
    "เพิ่มรายละเอียดหรือตัวอย่างประกอบ",
    "พิจารณาแชร์กับกลุ่ม PLC",
    "ติดตามผลและบันทึกความก้าวหน้า",
];

/// Canned reflection returned whenever the endpoint cannot produce one.
pub fn fallback_reflection() -> Reflection {
    let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
    Reflection {
        key_points: owned(&KEY_POINTS),
        questions: owned(&QUESTIONS),
        suggestions: owned(&SUGGESTIONS),
    }
}
